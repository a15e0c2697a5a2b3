use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    complaint, models, user,
    validation::{ComplaintSubmission, StatusUpdate},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        complaint::create_complaint_with_image,
        complaint::find_complaint_by_ticket,
        complaint::list_complaints,
        complaint::get_complaint,
        complaint::update_complaint,
        complaint::delete_complaint,
        complaint::complaint_stats,
        user::register,
        user::login,
        user::logout,
        user::me,
    ),
    components(schemas(
        models::ComplaintCategory,
        models::ComplaintStatus,
        models::Role,
        models::User,
        models::ComplaintView,
        models::ComplaintPage,
        models::ComplaintEnvelope,
        models::ComplaintStats,
        models::StatusCounts,
        models::MessageResponse,
        ComplaintSubmission,
        StatusUpdate,
        user::RegisterRequest,
        user::LoginRequest,
        user::AuthResponse,
        user::MeResponse,
    )),
    modifiers(&BearerToken),
    tags(
        (name = "complaints", description = "Citizen complaint submission, tracking and triage"),
        (name = "accounts", description = "Registration and bearer token issuance")
    )
)]
pub struct ApiDoc;

struct BearerToken;

impl Modify for BearerToken {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_token",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
