//! Standard response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Success<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct Failure {
    pub error: String,
    pub message: String,
}

pub fn success<T: Serialize>(data: T) -> (StatusCode, Json<Success<T>>) {
    (StatusCode::OK, Json(Success { data }))
}

pub fn failure(code: &str, message: String) -> Json<Failure> {
    Json(Failure {
        error: code.to_string(),
        message,
    })
}
