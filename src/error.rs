use std::{collections::BTreeMap, io};

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Validation messages keyed by the offending field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Conflict,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Conflict
            }
            _ => StoreError::Database(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", first_message(.0))]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("Anda tidak memiliki akses ke resource ini.")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("Gagal menyimpan berkas")]
    Storage(#[from] io::Error),

    #[error("Terjadi kesalahan pada server")]
    Database(#[from] StoreError),

    #[error("Terjadi kesalahan pada server")]
    Internal(String),
}

impl ApiError {
    pub fn complaint_not_found() -> Self {
        ApiError::NotFound("Laporan tidak ditemukan".to_owned())
    }

    /// A validation failure carrying a single message for one field.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_owned(), vec![message.to_owned()]);
        ApiError::Validation(errors)
    }
}

/// Rule order of the request forms. Unlisted fields sort after these.
const FIELD_ORDER: [&str; 9] = [
    "name",
    "email",
    "password",
    "phone",
    "address",
    "category",
    "description",
    "image",
    "status",
];

fn in_rule_order(errors: &FieldErrors) -> Vec<(&String, &Vec<String>)> {
    let rank = |field: &str| {
        FIELD_ORDER
            .iter()
            .position(|known| *known == field)
            .unwrap_or(FIELD_ORDER.len())
    };
    let mut fields: Vec<_> = errors.iter().collect();
    fields.sort_by_key(|(field, _)| rank(field.as_str()));
    fields
}

fn first_message(errors: &FieldErrors) -> &str {
    in_rule_order(errors)
        .into_iter()
        .flat_map(|(_, messages)| messages.first())
        .next()
        .map_or("Data yang diberikan tidak valid", String::as_str)
}

impl From<BlockingError> for ApiError {
    fn from(err: BlockingError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self:?}");
        }

        match self {
            ApiError::Validation(errors) => {
                let errors: Map<String, Value> = in_rule_order(errors)
                    .into_iter()
                    .map(|(field, messages)| (field.clone(), json!(messages)))
                    .collect();
                HttpResponse::build(status).json(json!({
                    "message": self.to_string(),
                    "errors": errors,
                }))
            }
            _ => HttpResponse::build(status).json(json!({ "message": self.to_string() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(
            ApiError::field("name", "Nama wajib diisi").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::complaint_not_found().status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Database(StoreError::Conflict).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn validation_body_lists_errors_per_field() {
        let mut errors = FieldErrors::new();
        errors.insert("description".to_owned(), vec!["Deskripsi minimal 20 karakter".to_owned()]);
        errors.insert("category".to_owned(), vec!["Kategori tidak valid".to_owned()]);

        let response = ApiError::Validation(errors).error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["message"], "Kategori tidak valid");
        assert_eq!(body["errors"]["description"][0], "Deskripsi minimal 20 karakter");
    }

    #[actix_web::test]
    async fn validation_errors_follow_rule_order() {
        let mut errors = FieldErrors::new();
        errors.insert("address".to_owned(), vec!["Alamat wajib diisi".to_owned()]);
        errors.insert("name".to_owned(), vec!["Nama wajib diisi".to_owned()]);
        errors.insert("category".to_owned(), vec!["Kategori wajib dipilih".to_owned()]);

        let err = ApiError::Validation(errors);
        assert_eq!(err.to_string(), "Nama wajib diisi");

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let fields: Vec<&String> = body["errors"].as_object().unwrap().keys().collect();

        assert_eq!(body["message"], "Nama wajib diisi");
        assert_eq!(fields, ["name", "address", "category"]);
    }

    #[actix_web::test]
    async fn internal_details_are_not_leaked() {
        let err = ApiError::Database(StoreError::Database(sqlx::Error::PoolTimedOut));
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body["message"], "Terjadi kesalahan pada server");
    }
}
