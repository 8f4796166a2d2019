use actix_web::{web, HttpResponse};
use serde::Deserialize;
use thiserror::Error;

use crate::{pipeline, state::AppState, util};

pub const ACKNOWLEDGEMENT: &str = "Video details logged successfully";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Malformed request body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing url")]
    MissingUrl,

    #[error("No video id (v=) in url: {0}")]
    NoVideoId(String),
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct Submission {
    pub url: String,
    pub video_id: String,
}

pub fn parse_submission(body: &[u8]) -> Result<Submission, RequestError> {
    let req: SubmitRequest = serde_json::from_slice(body)?;
    let url = match req.url {
        Some(url) if !url.trim().is_empty() => url,
        _ => return Err(RequestError::MissingUrl),
    };
    let video_id = util::video_id_from_url(&url)
        .ok_or_else(|| RequestError::NoVideoId(url.clone()))?
        .to_string();
    Ok(Submission { url, video_id })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Other methods on `/` get 405 from the resource, other paths 404.
    cfg.service(web::resource("/").route(web::post().to(submit)));
}

pub async fn submit(body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    let submission = match parse_submission(&body) {
        Ok(s) => s,
        Err(e) => {
            log::error!("[REQUEST] {}", e);
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };

    log::info!("[REQUEST] Video URL: {}", submission.url);
    log::info!("[REQUEST] Video ID: {}", submission.video_id);

    // Waits here while an earlier request is still downloading.
    let permit = match state.limiter.clone().acquire_owned().await {
        Ok(p) => p,
        Err(_) => return HttpResponse::ServiceUnavailable().body("Shutting down"),
    };

    let provider = state.provider.clone();
    let soundboard = state.soundboard.clone();
    let output_dir = state.config.output_dir.clone();
    actix_web::rt::spawn(async move {
        let _permit = permit;
        pipeline::process(
            &submission.video_id,
            provider.as_ref(),
            soundboard.as_ref(),
            &output_dir,
        )
        .await;
    });

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(ACKNOWLEDGEMENT)
}
