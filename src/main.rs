use std::sync::Arc;

use actix_web::{web, App, HttpServer};

mod config;
mod handlers;
mod pipeline;
mod soundpad;
mod state;
mod util;
mod ytdlp;

use crate::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cfg = match config::AppConfig::load_from_args(std::env::args()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("[CONFIG] {:#}", e);
            std::process::exit(1);
        }
    };

    let soundpad = match soundpad::connect(&cfg.soundpad_pipe).await {
        Ok(s) => {
            log::info!("[STARTUP] Connected to Soundpad.");
            s
        }
        Err(e) => {
            log::error!("[STARTUP] Failed to connect to Soundpad: {}", e);
            std::process::exit(1);
        }
    };

    let provider = Arc::new(ytdlp::YtDlp::from_config(&cfg));
    let bind_addr = cfg.listen_addr.clone();
    let state = web::Data::new(AppState::new(cfg, provider, Arc::new(soundpad)));

    log::info!("[STARTUP] Listening for requests on http://{}/", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(bind_addr.as_str())?
    .run()
    .await
}
