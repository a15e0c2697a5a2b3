use actix_web::{
    get, post,
    web::{self, Data, Json},
    HttpResponse,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use log::info;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    access::Authenticated,
    config::AdminSeed,
    database::UserStore,
    error::{ApiError, StoreError},
    models::{AppState, MessageResponse, NewUser, Role, User},
    validation::{field_errors, present, push},
};

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(
        required(message = "Nama wajib diisi"),
        length(max = 255, message = "Nama maksimal 255 karakter")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "Email wajib diisi"),
        email(message = "Format email tidak valid"),
        length(max = 255, message = "Email maksimal 255 karakter")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Password wajib diisi"),
        length(min = 8, message = "Password minimal 8 karakter")
    )]
    pub password: Option<String>,

    pub password_confirmation: Option<String>,

    #[validate(length(max = 20, message = "Nomor HP maksimal 20 karakter"))]
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(
        required(message = "Email wajib diisi"),
        email(message = "Format email tidak valid")
    )]
    pub email: Option<String>,

    #[validate(required(message = "Password wajib diisi"))]
    pub password: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
}

const WRONG_CREDENTIALS: &str = "Email atau password salah.";

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    web::block(move || hash_password(&password))
        .await?
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
}

#[utoipa::path(
    context_path = "/api",
    tag = "accounts",
    request_body(content = RegisterRequest, content_type = "application/json", example = json!({
        "name": "Budi",
        "email": "budi@x.com",
        "password": "rahasia123",
        "password_confirmation": "rahasia123",
        "phone": "0811"
    })),
    responses(
        (status = 201, description = "The account was created and signed in", body = AuthResponse),
        (status = 422, description = "One or more fields failed validation"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/register")]
pub async fn register(
    data: Data<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = RegisterRequest {
        name: present(request.name),
        email: present(request.email),
        password: request.password.filter(|password| !password.is_empty()),
        password_confirmation: request.password_confirmation,
        phone: present(request.phone),
    };

    let mut errors = match request.validate() {
        Ok(()) => Default::default(),
        Err(errors) => field_errors(&errors),
    };
    if request.password.is_some() && request.password != request.password_confirmation {
        push(&mut errors, "password", "Konfirmasi password tidak cocok");
    }

    let (Some(name), Some(email), Some(password)) = (request.name, request.email, request.password)
    else {
        return Err(ApiError::Validation(errors));
    };
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let new_user = NewUser {
        name,
        email,
        password_hash: hash_password_blocking(password).await?,
        phone: request.phone,
        role: Role::User,
    };

    let user = match data.users.create(&new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict) => {
            return Err(ApiError::field("email", "Email sudah terdaftar"));
        }
        Err(err) => return Err(err.into()),
    };
    let token = data.credentials.issue(&user).await?;
    info!("Registered user {}", user.id);

    Ok(HttpResponse::Created().json(AuthResponse {
        message: "Registrasi berhasil".to_owned(),
        user,
        token,
        role: None,
    }))
}

#[utoipa::path(
    context_path = "/api",
    tag = "accounts",
    request_body(content = LoginRequest, content_type = "application/json", example = json!({
        "email": "admin@laporwarga.com",
        "password": "admin123"
    })),
    responses(
        (status = 200, description = "Signed in; the token authorizes later requests", body = AuthResponse),
        (status = 422, description = "Missing fields or wrong email/password"),
        (status = 500, description = "An internal server error occurred")
    )
)]
#[post("/login")]
pub async fn login(
    data: Data<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = LoginRequest {
        email: present(request.email),
        password: request.password.filter(|password| !password.is_empty()),
    };
    request
        .validate()
        .map_err(|errors| ApiError::Validation(field_errors(&errors)))?;
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(ApiError::field("email", WRONG_CREDENTIALS));
    };

    let Some((user, hash)) = data.users.find_with_password(&email).await? else {
        return Err(ApiError::field("email", WRONG_CREDENTIALS));
    };
    if !web::block(move || verify_password(&password, &hash)).await? {
        return Err(ApiError::field("email", WRONG_CREDENTIALS));
    }

    let token = data.credentials.issue(&user).await?;
    info!("User {} signed in", user.id);

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login berhasil".to_owned(),
        role: Some(user.role),
        user,
        token,
    }))
}

#[utoipa::path(
    context_path = "/api",
    tag = "accounts",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "The presented token was revoked", body = MessageResponse),
        (status = 401, description = "No valid credential was presented")
    )
)]
#[post("/logout")]
pub async fn logout(
    data: Data<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<HttpResponse, ApiError> {
    data.credentials.revoke(&identity.token).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Logout berhasil")))
}

#[utoipa::path(
    context_path = "/api",
    tag = "accounts",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "The signed-in user", body = MeResponse),
        (status = 401, description = "No valid credential was presented")
    )
)]
#[get("/me")]
pub async fn me(Authenticated(identity): Authenticated) -> HttpResponse {
    HttpResponse::Ok().json(MeResponse {
        user: identity.user,
    })
}

/// Creates the configured admin account unless its email is already taken.
/// Returns whether an account was created.
pub async fn seed_admin(users: &dyn UserStore, seed: &AdminSeed) -> Result<bool, ApiError> {
    if users.find_with_password(&seed.email).await?.is_some() {
        return Ok(false);
    }

    let admin = NewUser {
        name: seed.name.clone(),
        email: seed.email.clone(),
        password_hash: hash_password_blocking(seed.password.clone()).await?,
        phone: seed.phone.clone(),
        role: Role::Admin,
    };

    match users.create(&admin).await {
        Ok(user) => {
            info!("Seeded admin account {} ({})", user.email, user.id);
            Ok(true)
        }
        Err(StoreError::Conflict) => Ok(false),
        Err(err) => Err(err.into()),
    }
}
