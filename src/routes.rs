use actix_multipart::{form::MultipartFormConfig, MultipartError};
use actix_web::{
    error::PayloadError,
    web::{self, JsonConfig, QueryConfig, ServiceConfig},
    HttpRequest,
};

use crate::{
    complaint,
    error::ApiError,
    user,
    validation::{IMAGE_TOO_LARGE, MAX_IMAGE_BYTES},
};

/// Whole multipart request, photo plus text fields.
const UPLOAD_LIMIT: usize = MAX_IMAGE_BYTES * 2;

fn multipart_error(err: MultipartError, _: &HttpRequest) -> actix_web::Error {
    match err {
        // Text parts stay far below the limits, so an overflow is the photo.
        MultipartError::Payload(PayloadError::Overflow) => {
            ApiError::field("image", IMAGE_TOO_LARGE).into()
        }
        err => ApiError::BadRequest(err.to_string()).into(),
    }
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.app_data(
        JsonConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        QueryConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        MultipartFormConfig::default()
            .total_limit(UPLOAD_LIMIT)
            .error_handler(multipart_error),
    )
    .service(
        web::scope("/api")
            .service(user::register)
            .service(user::login)
            .service(user::logout)
            .service(user::me)
            .service(complaint::create_complaint_with_image)
            .service(complaint::create_complaint)
            .service(complaint::find_complaint_by_ticket)
            .service(complaint::list_complaints)
            .service(complaint::get_complaint)
            .service(complaint::update_complaint)
            .service(complaint::delete_complaint)
            .service(complaint::complaint_stats),
    );
}
