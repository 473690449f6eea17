use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get, web};
use dotenvy::dotenv;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod feed;
mod jobs;
mod mailer;
mod map;
mod model;
mod models;
mod routes;
mod storage;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::feed::ChangeFeed;
use crate::mailer::Mailer;
use crate::map::{MapRenderer, OpenStreetMap};
use crate::storage::PhotoStore;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "HR directory & attendance service"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let feed = ChangeFeed::new();
    let photo_store = PhotoStore::new(&config.media_root, &config.public_base_url);

    let mailer = Mailer::from_config(&config);
    if mailer.is_none() {
        warn!("Gmail credentials not configured; overdue reminders will not be emailed");
    }

    let map_renderer: Data<dyn MapRenderer> =
        Data::from(Arc::new(OpenStreetMap::default()) as Arc<dyn MapRenderer>);

    // Overdue clock-out sweep runs for the life of the server.
    actix_web::rt::spawn(jobs::overdue::run(
        pool.clone(),
        config.clone(),
        mailer.clone(),
        feed.clone(),
    ));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(feed.clone()))
            .app_data(Data::new(photo_store.clone()))
            .app_data(Data::new(mailer.clone()))
            .app_data(map_renderer.clone())
            // Profile photo bodies arrive as raw bytes.
            .app_data(web::PayloadConfig::new(5 * 1024 * 1024))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
