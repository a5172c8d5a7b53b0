// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use log::info;
use std::sync::Arc;

mod config;
mod controller;
mod errors;
mod handlers;
mod models;
mod services;
mod session;

use crate::config::Config;
use crate::controller::Controller;
use crate::services::{GeminiClient, MediaEncoder, Orchestrator, SessionStore};

#[derive(Clone)]
pub struct AppState {
    controller: Arc<Controller>,
    media_encoder: Arc<MediaEncoder>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Starcraze service...");

    let config = Config::from_env()?;

    // Initialize services
    let api = Arc::new(GeminiClient::new(&config));
    let orchestrator = Arc::new(Orchestrator::new(api));
    let sessions = Arc::new(SessionStore::new());

    let app_state = AppState {
        controller: Arc::new(Controller::new(orchestrator, sessions)),
        media_encoder: Arc::new(MediaEncoder::new()),
    };

    info!(
        "Using text model {} and image model {}",
        config.text_model, config.image_model
    );
    info!("Starting HTTP server on {}", config.bind);

    let static_dir = config.static_dir.clone();

    HttpServer::new(move || {
        let static_dir = static_dir.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::configure)
            .configure(move |cfg| {
                if let Some(dir) = static_dir {
                    cfg.service(actix_files::Files::new("/", dir).index_file("index.html"));
                }
            })
    })
    .bind(config.bind.as_str())?
    .run()
    .await?;

    Ok(())
}
