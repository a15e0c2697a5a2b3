use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{access::Credentials, database::UserStore, registry::ComplaintRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: ComplaintRegistry,
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn Credentials>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "complaint_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintCategory {
    JalanRusak,
    Sampah,
    Penerangan,
    SaluranAir,
    FasilitasUmum,
    Lainnya,
}

impl ComplaintCategory {
    pub const ALL: [ComplaintCategory; 6] = [
        ComplaintCategory::JalanRusak,
        ComplaintCategory::Sampah,
        ComplaintCategory::Penerangan,
        ComplaintCategory::SaluranAir,
        ComplaintCategory::FasilitasUmum,
        ComplaintCategory::Lainnya,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintCategory::JalanRusak => "jalan_rusak",
            ComplaintCategory::Sampah => "sampah",
            ComplaintCategory::Penerangan => "penerangan",
            ComplaintCategory::SaluranAir => "saluran_air",
            ComplaintCategory::FasilitasUmum => "fasilitas_umum",
            ComplaintCategory::Lainnya => "lainnya",
        }
    }

    /// Display name shown to citizens and admins.
    pub fn label(&self) -> &'static str {
        match self {
            ComplaintCategory::JalanRusak => "Jalan Rusak",
            ComplaintCategory::Sampah => "Sampah Menumpuk",
            ComplaintCategory::Penerangan => "Penerangan Jalan Mati",
            ComplaintCategory::SaluranAir => "Saluran Air Tersumbat",
            ComplaintCategory::FasilitasUmum => "Fasilitas Umum Rusak",
            ComplaintCategory::Lainnya => "Lainnya",
        }
    }
}

impl FromStr for ComplaintCategory {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_owned()))
    }
}

impl fmt::Display for ComplaintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Type,
    ToSchema,
)]
#[sqlx(type_name = "complaint_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 4] = [
        ComplaintStatus::Pending,
        ComplaintStatus::InProgress,
        ComplaintStatus::Completed,
        ComplaintStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Completed => "completed",
            ComplaintStatus::Rejected => "rejected",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "Menunggu",
            ComplaintStatus::InProgress => "Diproses",
            ComplaintStatus::Completed => "Selesai",
            ComplaintStatus::Rejected => "Ditolak",
        }
    }
}

impl FromStr for ComplaintStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_owned()))
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// A stored complaint row.
#[derive(Debug, Clone, FromRow)]
pub struct Complaint {
    pub id: i64,
    pub ticket_number: String,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub category: ComplaintCategory,
    pub description: String,
    pub image_path: Option<String>,
    pub status: ComplaintStatus,
    pub admin_notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub ticket_number: String,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub category: ComplaintCategory,
    pub description: String,
    pub image_path: Option<String>,
}

/// Status change applied by an admin. `admin_notes` is `None` when the
/// stored note should be kept and `Some(None)` when it should be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: ComplaintStatus,
    pub admin_notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub category: Option<ComplaintCategory>,
    pub search: Option<String>,
}

/// Complaint as returned over the API, with its derived presentation fields.
#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintView {
    pub id: i64,
    pub ticket_number: String,
    pub user_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub category: ComplaintCategory,
    pub description: String,
    pub image_path: Option<String>,
    pub status: ComplaintStatus,
    pub admin_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub image_url: Option<String>,
    pub category_label: String,
    pub status_label: String,
    pub user: Option<User>,
}

impl ComplaintView {
    pub fn new(complaint: Complaint, image_url: Option<String>, user: Option<User>) -> Self {
        Self {
            category_label: complaint.category.label().to_owned(),
            status_label: complaint.status.label().to_owned(),
            id: complaint.id,
            ticket_number: complaint.ticket_number,
            user_id: complaint.user_id,
            name: complaint.name,
            email: complaint.email,
            phone: complaint.phone,
            address: complaint.address,
            category: complaint.category,
            description: complaint.description,
            image_path: complaint.image_path,
            status: complaint.status,
            admin_notes: complaint.admin_notes,
            created_at: complaint.created_at,
            updated_at: complaint.updated_at,
            image_url,
            user,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintPage {
    pub current_page: i64,
    pub data: Vec<ComplaintView>,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub rejected: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComplaintStats {
    pub stats: StatusCounts,
    pub by_category: BTreeMap<String, i64>,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ComplaintEnvelope {
    pub message: String,
    pub complaint: ComplaintView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_its_wire_name() {
        for category in ComplaintCategory::ALL {
            assert_eq!(category.as_str().parse::<ComplaintCategory>(), Ok(category));
        }
        assert!("banjir".parse::<ComplaintCategory>().is_err());
        assert!("Sampah".parse::<ComplaintCategory>().is_err());
    }

    #[test]
    fn labels_match_lookup_tables() {
        assert_eq!(ComplaintCategory::Sampah.label(), "Sampah Menumpuk");
        assert_eq!(ComplaintCategory::SaluranAir.label(), "Saluran Air Tersumbat");
        assert_eq!(ComplaintStatus::InProgress.label(), "Diproses");
        assert_eq!(ComplaintStatus::Rejected.label(), "Ditolak");
    }

    #[test]
    fn status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_value(ComplaintStatus::InProgress).unwrap(),
            serde_json::json!("in_progress")
        );
        assert_eq!(ComplaintStatus::default(), ComplaintStatus::Pending);
        assert!("done".parse::<ComplaintStatus>().is_err());
    }
}
