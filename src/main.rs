use std::{env, fmt::Display, fs, io, sync::Arc};

use actix_files::Files;
use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use log::{error, info};
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    access::TokenCredentials,
    config::Config,
    database::{PgComplaintStore, PgUserStore},
    docs::ApiDoc,
    models::AppState,
    registry::ComplaintRegistry,
    storage::LocalBlobStore,
};

mod access;
mod complaint;
mod config;
mod database;
mod docs;
mod error;
mod models;
mod registry;
mod routes;
mod storage;
#[cfg(test)]
mod testing;
mod ticket;
mod user;
mod validation;

fn initalize_syslog() {
    let log_level = config::log_level(env::var("LOG_LEVEL").ok().as_deref());
    let log_result = syslog::init(syslog::Facility::LOG_SYSLOG, log_level, None);
    if log_result.is_err() {
        eprintln!("WARNING! Failed to initialize logging system! Server logs will be unavaliable!");
    }
}

fn startup_failure(context: &str, err: impl Display) -> io::Error {
    let message = format!("ERROR: {context}: {err}");
    error!("{message}");
    eprintln!("{message}");
    io::Error::new(io::ErrorKind::Other, message)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    initalize_syslog();

    let config = Config::from_env().map_err(|err| startup_failure("Invalid configuration", err))?;

    let pool = PgPool::connect_lazy(config.database_url.as_str())
        .map_err(|err| startup_failure("Failed to connect to the database", err))?;
    info!("Connected to the database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|err| startup_failure("Failed to run database migrations", err))?;

    fs::create_dir_all(&config.storage_dir)
        .map_err(|err| startup_failure("Failed to create the storage directory", err))?;

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let complaints = Arc::new(PgComplaintStore::new(pool));
    let blobs = Arc::new(LocalBlobStore::new(
        config.storage_dir.clone(),
        config.public_url.clone(),
    ));

    if let Some(seed) = &config.admin {
        user::seed_admin(users.as_ref(), seed)
            .await
            .map_err(|err| startup_failure("Failed to seed the admin account", err))?;
    }

    let state = Data::new(AppState {
        registry: ComplaintRegistry::new(complaints, users.clone(), blobs),
        credentials: Arc::new(TokenCredentials::new(users.clone())),
        users,
    });
    let openapi = ApiDoc::openapi();
    let storage_dir = config.storage_dir.clone();

    info!(
        "Listening on {}:{} with uploads in {}",
        config.bind_address,
        config.port,
        storage_dir.display()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
            .service(Files::new("/storage", storage_dir.clone()))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run()
    .await
}
