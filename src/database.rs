use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    error::StoreError,
    models::{
        Complaint, ComplaintCategory, ComplaintFilter, ComplaintStatus, NewComplaint, NewUser,
        Role, StatusChange, User,
    },
};

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the ticket number is taken.
    async fn insert(&self, complaint: &NewComplaint) -> Result<Complaint, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError>;

    async fn find_by_ticket(&self, ticket_number: &str) -> Result<Option<Complaint>, StoreError>;

    /// Newest first. Returns the requested slice and the total match count.
    async fn list(
        &self,
        filter: &ComplaintFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Complaint>, i64), StoreError>;

    async fn update_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<Option<Complaint>, StoreError>;

    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    async fn count_by_status(&self) -> Result<Vec<(ComplaintStatus, i64)>, StoreError>;

    async fn count_by_category(&self) -> Result<Vec<(ComplaintCategory, i64)>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, user: &NewUser) -> Result<User, StoreError>;

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<User>, StoreError>;

    /// The user registered under `email` together with their password hash.
    async fn find_with_password(&self, email: &str) -> Result<Option<(User, String)>, StoreError>;

    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError>;

    async fn find_by_token(&self, token_hash: &str) -> Result<Option<User>, StoreError>;

    async fn revoke_token(&self, token_hash: &str) -> Result<(), StoreError>;
}

const COMPLAINT_COLUMNS: &str = "id, ticket_number, user_id, name, email, phone, address, \
    category, description, image_path, status, admin_notes, created_at, updated_at";

const USER_COLUMNS: &str = "id, name, email, phone, role, created_at, updated_at";

pub struct PgComplaintStore {
    database: PgPool,
}

impl PgComplaintStore {
    pub fn new(database: PgPool) -> Self {
        Self { database }
    }
}

/// Escapes `LIKE` metacharacters so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ComplaintFilter) {
    builder.push(" WHERE TRUE");

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }

    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category);
    }

    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (ticket_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR address ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait]
impl ComplaintStore for PgComplaintStore {
    async fn insert(&self, complaint: &NewComplaint) -> Result<Complaint, StoreError> {
        let inserted = query_as::<_, Complaint>(&format!(
            r#"
            INSERT INTO complaints (
                ticket_number, user_id, name, email, phone, address,
                category, description, image_path
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COMPLAINT_COLUMNS}
            "#
        ))
        .bind(&complaint.ticket_number)
        .bind(complaint.user_id)
        .bind(&complaint.name)
        .bind(&complaint.email)
        .bind(&complaint.phone)
        .bind(&complaint.address)
        .bind(complaint.category)
        .bind(&complaint.description)
        .bind(&complaint.image_path)
        .fetch_one(&self.database)
        .await?;

        Ok(inserted)
    }

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError> {
        let complaint = query_as::<_, Complaint>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.database)
        .await?;

        Ok(complaint)
    }

    async fn find_by_ticket(&self, ticket_number: &str) -> Result<Option<Complaint>, StoreError> {
        let complaint = query_as::<_, Complaint>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE ticket_number = $1"
        ))
        .bind(ticket_number)
        .fetch_optional(&self.database)
        .await?;

        Ok(complaint)
    }

    async fn list(
        &self,
        filter: &ComplaintFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Complaint>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM complaints");
        push_filter(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.database)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints"
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let complaints = select
            .build_query_as::<Complaint>()
            .fetch_all(&self.database)
            .await?;

        Ok((complaints, total))
    }

    async fn update_status(
        &self,
        id: i64,
        change: &StatusChange,
    ) -> Result<Option<Complaint>, StoreError> {
        let (replace_notes, notes) = match &change.admin_notes {
            Some(notes) => (true, notes.clone()),
            None => (false, None),
        };

        let complaint = query_as::<_, Complaint>(&format!(
            r#"
            UPDATE complaints
            SET status = $2,
                admin_notes = CASE WHEN $3 THEN $4 ELSE admin_notes END,
                updated_at = now()
            WHERE id = $1
            RETURNING {COMPLAINT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(change.status)
        .bind(replace_notes)
        .bind(notes)
        .fetch_optional(&self.database)
        .await?;

        Ok(complaint)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = query("DELETE FROM complaints WHERE id = $1")
            .bind(id)
            .execute(&self.database)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(ComplaintStatus, i64)>, StoreError> {
        let counts = query_as::<_, (ComplaintStatus, i64)>(
            "SELECT status, COUNT(*) FROM complaints GROUP BY status",
        )
        .fetch_all(&self.database)
        .await?;

        Ok(counts)
    }

    async fn count_by_category(&self) -> Result<Vec<(ComplaintCategory, i64)>, StoreError> {
        let counts = query_as::<_, (ComplaintCategory, i64)>(
            "SELECT category, COUNT(*) FROM complaints GROUP BY category",
        )
        .fetch_all(&self.database)
        .await?;

        Ok(counts)
    }
}

pub struct PgUserStore {
    database: PgPool,
}

impl PgUserStore {
    pub fn new(database: PgPool) -> Self {
        Self { database }
    }
}

#[derive(FromRow)]
struct UserWithPassword {
    id: i64,
    name: String,
    email: String,
    phone: Option<String>,
    role: Role,
    password_hash: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserWithPassword> for (User, String) {
    fn from(row: UserWithPassword) -> Self {
        let user = User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        (user, row.password_hash)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: &NewUser) -> Result<User, StoreError> {
        let created = query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, phone, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role)
        .fetch_one(&self.database)
        .await?;

        Ok(created)
    }

    async fn find_many(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.database)
        .await?;

        Ok(users)
    }

    async fn find_with_password(&self, email: &str) -> Result<Option<(User, String)>, StoreError> {
        let row = query_as::<_, UserWithPassword>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.database)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn store_token(&self, user_id: i64, token_hash: &str) -> Result<(), StoreError> {
        query("INSERT INTO access_tokens (user_id, token_hash) VALUES ($1, $2)")
            .bind(user_id)
            .bind(token_hash)
            .execute(&self.database)
            .await?;

        Ok(())
    }

    async fn find_by_token(&self, token_hash: &str) -> Result<Option<User>, StoreError> {
        let user = query_as::<_, User>(
            r#"
            UPDATE access_tokens t
            SET last_used_at = now()
            FROM users u
            WHERE t.token_hash = $1
                AND u.id = t.user_id
            RETURNING u.id, u.name, u.email, u.phone, u.role, u.created_at, u.updated_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.database)
        .await?;

        Ok(user)
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<(), StoreError> {
        query("DELETE FROM access_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.database)
            .await?;

        Ok(())
    }
}
