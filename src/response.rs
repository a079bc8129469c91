use actix_web::{error::JsonPayloadError, HttpRequest};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let app_err = match err {
        JsonPayloadError::ContentType => AppError::validation("expected a json request body"),
        _ => AppError::validation("invalid request body"),
    };
    app_err.into()
}
