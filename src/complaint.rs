use std::fs;

use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{
    delete, get,
    guard::GuardContext,
    http::header,
    post, put,
    web::{self, Data, Json, Path, Query},
    HttpResponse,
};

use crate::{
    access::{Admin, Caller},
    error::ApiError,
    models::{AppState, ComplaintEnvelope, ComplaintView, MessageResponse},
    validation::{ComplaintSubmission, ImageUpload, ListQuery, StatusUpdate},
};

/// Multipart variant of [`ComplaintSubmission`] carrying an optional photo.
#[derive(MultipartForm)]
pub struct ComplaintForm {
    name: Option<Text<String>>,
    email: Option<Text<String>>,
    phone: Option<Text<String>>,
    address: Option<Text<String>>,
    category: Option<Text<String>>,
    description: Option<Text<String>>,
    #[multipart(limit = "5 MiB")]
    image: Option<TempFile>,
}

impl ComplaintForm {
    fn into_parts(self) -> (ComplaintSubmission, Option<TempFile>) {
        let submission = ComplaintSubmission {
            name: self.name.map(Text::into_inner),
            email: self.email.map(Text::into_inner),
            phone: self.phone.map(Text::into_inner),
            address: self.address.map(Text::into_inner),
            category: self.category.map(Text::into_inner),
            description: self.description.map(Text::into_inner),
        };

        // Browsers send an empty part when no file was chosen.
        let image = self.image.filter(|file| {
            file.size > 0 || file.file_name.as_deref().is_some_and(|name| !name.is_empty())
        });

        (submission, image)
    }
}

async fn read_upload(file: TempFile) -> Result<ImageUpload, ApiError> {
    let file_name = file.file_name.clone();
    let bytes = web::block(move || fs::read(file.file.path())).await??;

    Ok(ImageUpload { bytes, file_name })
}

fn multipart_request(ctx: &GuardContext) -> bool {
    ctx.header::<header::ContentType>().is_some_and(|content_type| {
        content_type.0.essence_str() == mime::MULTIPART_FORM_DATA.essence_str()
    })
}

fn created(complaint: ComplaintView) -> HttpResponse {
    HttpResponse::Created().json(ComplaintEnvelope {
        message: "Laporan berhasil dibuat".to_owned(),
        complaint,
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    request_body(content = ComplaintSubmission, content_type = "multipart/form-data",
        description = "Complaint fields plus an optional `image` file (jpeg, png or gif, at most 5 MB)"),
    responses(
        (status = 201, description = "The complaint was recorded and a ticket assigned", body = ComplaintEnvelope),
        (status = 422, description = "One or more fields failed validation"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/complaints", guard = "multipart_request")]
pub async fn create_complaint_with_image(
    data: Data<AppState>,
    caller: Caller,
    MultipartForm(form): MultipartForm<ComplaintForm>,
) -> Result<HttpResponse, ApiError> {
    let (submission, image) = form.into_parts();
    let image = match image {
        Some(file) => Some(read_upload(file).await?),
        None => None,
    };

    let complaint = data
        .registry
        .create(submission, image, caller.user_id())
        .await?;
    Ok(created(complaint))
}

#[post("/complaints")]
pub async fn create_complaint(
    data: Data<AppState>,
    caller: Caller,
    Json(submission): Json<ComplaintSubmission>,
) -> Result<HttpResponse, ApiError> {
    let complaint = data
        .registry
        .create(submission, None, caller.user_id())
        .await?;
    Ok(created(complaint))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    params(("ticket_number" = String, Path, description = "Public ticket number, e.g. LP251204-7Q2XKD")),
    responses(
        (status = 200, description = "The complaint registered under the ticket", body = ComplaintView),
        (status = 404, description = "No complaint carries this ticket", body = MessageResponse),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/complaints/ticket/{ticket_number}")]
pub async fn find_complaint_by_ticket(
    data: Data<AppState>,
    path: Path<String>,
) -> Result<HttpResponse, ApiError> {
    let ticket_number = path.into_inner();

    let complaint = data.registry.find_by_ticket(&ticket_number).await?;
    Ok(HttpResponse::Ok().json(complaint))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    params(ListQuery),
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "One page of complaints, newest first", body = ComplaintPage),
        (status = 401, description = "No valid credential was presented"),
        (status = 403, description = "The caller is not an admin"),
        (status = 422, description = "Unknown status or category filter"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/complaints")]
pub async fn list_complaints(
    _admin: Admin,
    data: Data<AppState>,
    query: Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = data.registry.list(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    params(("id" = i64, Path, description = "Complaint id")),
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "The requested complaint", body = ComplaintView),
        (status = 401, description = "No valid credential was presented"),
        (status = 403, description = "The caller is not an admin"),
        (status = 404, description = "The requested complaint was not found", body = MessageResponse),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/complaints/{id}")]
pub async fn get_complaint(
    _admin: Admin,
    data: Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let complaint = data.registry.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(complaint))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    params(("id" = i64, Path, description = "Complaint id")),
    request_body(content = StatusUpdate, content_type = "application/json", example = json!({
        "status": "completed",
        "admin_notes": "Sudah dibersihkan"
    })),
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "The complaint was updated", body = ComplaintEnvelope),
        (status = 401, description = "No valid credential was presented"),
        (status = 403, description = "The caller is not an admin"),
        (status = 404, description = "The requested complaint was not found", body = MessageResponse),
        (status = 422, description = "Missing or unknown status"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[put("/complaints/{id}")]
pub async fn update_complaint(
    admin: Admin,
    data: Data<AppState>,
    path: Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let complaint = data.registry.update(id, update).await?;
    log::debug!("Complaint {id} updated by user {}", admin.0.user.id);

    Ok(HttpResponse::Ok().json(ComplaintEnvelope {
        message: "Laporan berhasil diperbarui".to_owned(),
        complaint,
    }))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    params(("id" = i64, Path, description = "Complaint id")),
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "The complaint and its image were deleted", body = MessageResponse),
        (status = 401, description = "No valid credential was presented"),
        (status = 403, description = "The caller is not an admin"),
        (status = 404, description = "The requested complaint was not found", body = MessageResponse),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[delete("/complaints/{id}")]
pub async fn delete_complaint(
    _admin: Admin,
    data: Data<AppState>,
    path: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    data.registry.delete(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Laporan berhasil dihapus")))
}

#[utoipa::path(
    context_path = "/api",
    tag = "complaints",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Complaint counts per status and per category", body = ComplaintStats),
        (status = 401, description = "No valid credential was presented"),
        (status = 403, description = "The caller is not an admin"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[get("/complaints-stats")]
pub async fn complaint_stats(_admin: Admin, data: Data<AppState>) -> Result<HttpResponse, ApiError> {
    let stats = data.registry.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}
