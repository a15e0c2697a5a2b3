use std::{env, path::PathBuf};

use log::LevelFilter;
use thiserror::Error;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORAGE_DIR: &str = "storage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to parse {0} enviroment variable: not set")]
    Missing(&'static str),

    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub public_url: String,
    pub admin: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned());
        let port = match var("PORT") {
            None => DEFAULT_PORT,
            Some(value) => value.trim().parse().map_err(|err| ConfigError::Invalid {
                key: "PORT",
                reason: format!("{err}"),
                value,
            })?,
        };
        let storage_dir = PathBuf::from(
            var("STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_owned()),
        );
        let public_url = var("PUBLIC_URL").unwrap_or_else(|| format!("http://{bind_address}:{port}"));

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: var("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_owned()),
                email,
                password,
                phone: var("ADMIN_PHONE"),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_address,
            port,
            storage_dir,
            public_url,
            admin,
        })
    }
}

pub fn log_level(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_uppercase).as_deref() {
        Some("ERROR") => LevelFilter::Error,
        Some("WARNING") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        Some("OFF") => LevelFilter::Off,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_database_is_set() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/lapor")]).unwrap();

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage_dir, PathBuf::from("storage"));
        assert_eq!(config.public_url, "http://127.0.0.1:8080");
        assert!(config.admin.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            config(&[("PORT", "9000")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = config(&[("DATABASE_URL", "postgres://db"), ("PORT", "delapan")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn admin_seed_needs_email_and_password() {
        let only_email = config(&[("DATABASE_URL", "postgres://db"), ("ADMIN_EMAIL", "a@b.c")]).unwrap();
        assert!(only_email.admin.is_none());

        let seeded = config(&[
            ("DATABASE_URL", "postgres://db"),
            ("ADMIN_EMAIL", "admin@laporwarga.com"),
            ("ADMIN_PASSWORD", "admin123"),
            ("PUBLIC_URL", "https://lapor.example"),
        ])
        .unwrap();
        let admin = seeded.admin.unwrap();
        assert_eq!(admin.name, "Administrator");
        assert_eq!(admin.email, "admin@laporwarga.com");
        assert_eq!(seeded.public_url, "https://lapor.example");
    }

    #[test]
    fn log_level_names_are_case_insensitive() {
        assert_eq!(log_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(log_level(Some("WARNING")), LevelFilter::Warn);
        assert_eq!(log_level(Some("verbose")), LevelFilter::Warn);
        assert_eq!(log_level(None), LevelFilter::Warn);
    }
}
