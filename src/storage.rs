use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use actix_web::web;
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};

const FILE_NAME_LEN: usize = 40;

/// Public blob namespace for uploaded images. Paths are relative to the
/// namespace root and resolvable through [`BlobStore::url`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, directory: &str, extension: &str, bytes: Vec<u8>) -> io::Result<String>;

    /// Removes a blob. Removing a blob that does not exist succeeds.
    async fn delete(&self, path: &str) -> io::Result<()>;

    fn url(&self, path: &str) -> String;
}

pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_url: String) -> Self {
        Self {
            root,
            public_url: public_url.trim_end_matches('/').to_owned(),
        }
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            Ok(self.root.join(relative))
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("blob path {path:?} escapes the storage root"),
            ))
        }
    }
}

pub fn random_file_name(extension: &str) -> String {
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FILE_NAME_LEN)
        .map(char::from)
        .collect();
    format!("{stem}.{extension}")
}

async fn blocking<T, F>(task: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(task)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, directory: &str, extension: &str, bytes: Vec<u8>) -> io::Result<String> {
        let path = format!("{directory}/{}", random_file_name(extension));
        let target = self.resolve(&path)?;

        blocking(move || {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, bytes)
        })
        .await?;

        Ok(path)
    }

    async fn delete(&self, path: &str) -> io::Result<()> {
        let target = self.resolve(path)?;

        blocking(move || match fs::remove_file(target) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        })
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/storage/{path}", self.public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> LocalBlobStore {
        LocalBlobStore::new(root.to_path_buf(), "http://localhost:8080/".to_owned())
    }

    #[actix_web::test]
    async fn put_writes_under_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let path = store.put("complaints", "png", b"data".to_vec()).await.unwrap();

        assert!(path.starts_with("complaints/"));
        assert!(path.ends_with(".png"));
        assert_eq!(fs::read(root.path().join(&path)).unwrap(), b"data");
    }

    #[actix_web::test]
    async fn delete_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());
        let path = store.put("complaints", "gif", b"GIF89a".to_vec()).await.unwrap();

        store.delete(&path).await.unwrap();
        assert!(!root.path().join(&path).exists());
        store.delete(&path).await.unwrap();
    }

    #[actix_web::test]
    async fn rejects_paths_outside_the_root() {
        let root = tempfile::tempdir().unwrap();
        let store = store(root.path());

        let err = store.delete("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn url_points_at_the_public_mount() {
        let store = LocalBlobStore::new(PathBuf::from("storage"), "https://lapor.example".to_owned());
        assert_eq!(
            store.url("complaints/abc.jpg"),
            "https://lapor.example/storage/complaints/abc.jpg"
        );
    }

    #[test]
    fn random_names_have_the_extension() {
        let name = random_file_name("jpg");
        assert_eq!(name.len(), FILE_NAME_LEN + 4);
        assert!(name.ends_with(".jpg"));
    }
}
