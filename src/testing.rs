//! In-memory stores backing the unit and HTTP tests.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use actix_web::web::Data;
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    access::TokenCredentials,
    database::{ComplaintStore, UserStore},
    error::StoreError,
    models::{
        AppState, Complaint, ComplaintCategory, ComplaintFilter, ComplaintStatus, NewComplaint,
        NewUser, Role, StatusChange, User,
    },
    registry::ComplaintRegistry,
    storage::{random_file_name, BlobStore},
    validation::ComplaintSubmission,
};

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

pub fn submission() -> ComplaintSubmission {
    ComplaintSubmission {
        name: Some("Budi".to_owned()),
        email: Some("budi@x.com".to_owned()),
        phone: Some("0811".to_owned()),
        address: Some("Jl. A".to_owned()),
        category: Some("sampah".to_owned()),
        description: Some("Sampah menumpuk sudah dua minggu di depan rumah".to_owned()),
    }
}

#[derive(Default)]
struct ComplaintTable {
    rows: Vec<Complaint>,
    next_id: i64,
    rejected_inserts: usize,
}

#[derive(Default)]
pub struct MemoryComplaintStore {
    table: Mutex<ComplaintTable>,
}

impl MemoryComplaintStore {
    pub fn len(&self) -> usize {
        self.table.lock().unwrap().rows.len()
    }

    /// Makes the next `count` inserts fail as if the ticket were taken.
    pub fn reject_next_inserts(&self, count: usize) {
        self.table.lock().unwrap().rejected_inserts = count;
    }
}

fn filter_matches(complaint: &Complaint, filter: &ComplaintFilter) -> bool {
    let search = filter.search.as_ref().map(|search| search.to_lowercase());
    filter.status.map_or(true, |status| complaint.status == status)
        && filter
            .category
            .map_or(true, |category| complaint.category == category)
        && search.map_or(true, |search| {
            [&complaint.ticket_number, &complaint.name, &complaint.address]
                .iter()
                .any(|field| field.to_lowercase().contains(&search))
        })
}

#[async_trait]
impl ComplaintStore for MemoryComplaintStore {
    async fn insert(&self, complaint: &NewComplaint) -> Result<Complaint, StoreError> {
        let mut table = self.table.lock().unwrap();
        if table.rejected_inserts > 0 {
            table.rejected_inserts -= 1;
            return Err(StoreError::Conflict);
        }
        if table
            .rows
            .iter()
            .any(|row| row.ticket_number == complaint.ticket_number)
        {
            return Err(StoreError::Conflict);
        }

        table.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = Complaint {
            id: table.next_id,
            ticket_number: complaint.ticket_number.clone(),
            user_id: complaint.user_id,
            name: complaint.name.clone(),
            email: complaint.email.clone(),
            phone: complaint.phone.clone(),
            address: complaint.address.clone(),
            category: complaint.category,
            description: complaint.description.clone(),
            image_path: complaint.image_path.clone(),
            status: ComplaintStatus::default(),
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table.rows.iter().find(|row| row.id == id).cloned())
    }

    async fn find_by_ticket(&self, ticket_number: &str) -> Result<Option<Complaint>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table
            .rows
            .iter()
            .find(|row| row.ticket_number == ticket_number)
            .cloned())
    }

    async fn list(
        &self,
        filter: &ComplaintFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Complaint>, i64), StoreError> {
        let table = self.table.lock().unwrap();
        let mut found: Vec<Complaint> = table
            .rows
            .iter()
            .filter(|row| filter_matches(row, filter))
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = found.len() as i64;
        let page = found
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<Option<Complaint>, StoreError> {
        let mut table = self.table.lock().unwrap();
        let Some(row) = table.rows.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };

        row.status = change.status;
        if let Some(notes) = &change.admin_notes {
            row.admin_notes = notes.clone();
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut table = self.table.lock().unwrap();
        let before = table.rows.len();
        table.rows.retain(|row| row.id != id);
        Ok(table.rows.len() < before)
    }

    async fn count_by_status(&self) -> Result<Vec<(ComplaintStatus, i64)>, StoreError> {
        let table = self.table.lock().unwrap();
        let mut counts: HashMap<ComplaintStatus, i64> = HashMap::new();
        for row in &table.rows {
            *counts.entry(row.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_by_category(&self) -> Result<Vec<(ComplaintCategory, i64)>, StoreError> {
        let table = self.table.lock().unwrap();
        let mut counts: HashMap<ComplaintCategory, i64> = HashMap::new();
        for row in &table.rows {
            *counts.entry(row.category).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[derive(Default)]
struct UserTable {
    users: Vec<(User, String)>,
    tokens: HashMap<String, i64>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    table: Mutex<UserTable>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut table = self.table.lock().unwrap();
        if table.users.iter().any(|(existing, _)| existing.email == user.email) {
            return Err(StoreError::Conflict);
        }

        let now = OffsetDateTime::now_utc();
        let created = User {
            id: table.users.len() as i64 + 1,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        table
            .users
            .push((created.clone(), user.password_hash.clone()));
        Ok(created)
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table
            .users
            .iter()
            .filter(|(user, _)| ids.contains(&user.id))
            .map(|(user, _)| user.clone())
            .collect())
    }

    async fn find_with_password(&self, email: &str) -> Result<Option<(User, String)>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table
            .users
            .iter()
            .find(|(user, _)| user.email == email)
            .cloned())
    }

    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError> {
        let mut table = self.table.lock().unwrap();
        table.tokens.insert(token_hash.to_owned(), user_id);
        Ok(())
    }

    async fn find_by_token(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.lock().unwrap();
        Ok(table.tokens.get(token_hash).and_then(|id| {
            table
                .users
                .iter()
                .find(|(user, _)| user.id == *id)
                .map(|(user, _)| user.clone())
        }))
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<(), StoreError> {
        self.table.lock().unwrap().tokens.remove(token_hash);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    pub fn clear(&self) {
        self.blobs.lock().unwrap().clear();
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, directory: &str, extension: &str, bytes: Vec<u8>) -> io::Result<String> {
        let path = format!("{directory}/{}", random_file_name(extension));
        self.blobs.lock().unwrap().insert(path.clone(), bytes);
        Ok(path)
    }

    async fn delete(&self, path: &str) -> io::Result<()> {
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("http://localhost:8080/storage/{path}")
    }
}

/// Application state wired to in-memory stores, with handles for assertions.
pub struct TestState {
    pub data: Data<AppState>,
    pub complaints: Arc<MemoryComplaintStore>,
    pub users: Arc<MemoryUserStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestState {
    pub fn new() -> Self {
        let complaints = Arc::new(MemoryComplaintStore::default());
        let users = Arc::new(MemoryUserStore::default());
        let blobs = Arc::new(MemoryBlobStore::default());
        let credentials = Arc::new(TokenCredentials::new(users.clone()));

        let data = Data::new(AppState {
            registry: ComplaintRegistry::new(complaints.clone(), users.clone(), blobs.clone()),
            users: users.clone(),
            credentials,
        });

        Self {
            data,
            complaints,
            users,
            blobs,
        }
    }

    /// Creates an account with the given role and returns a bearer token for it.
    pub async fn token_for(&self, email: &str, role: Role) -> String {
        let user = self
            .users
            .create(&NewUser {
                name: "Petugas".to_owned(),
                email: email.to_owned(),
                password_hash: "unused".to_owned(),
                phone: None,
                role,
            })
            .await
            .unwrap();
        self.data.credentials.issue(&user).await.unwrap()
    }
}
