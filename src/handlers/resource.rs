//! Resource handlers: one per operation. State is the resource's controller;
//! extractor rejections become the failure envelope.

use crate::context::Context;
use crate::controller::{PageParams, ResourceController};
use crate::error::ApiError;
use crate::response::success;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

fn body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| ApiError::Malformed(rejection.body_text()))
}

pub async fn get_many(
    State(controller): State<Arc<ResourceController>>,
    ctx: Context,
    query: Result<Query<PageParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = query.map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
    let rows = controller.get_many(&ctx, params).await?;
    Ok(success(rows))
}

pub async fn get_one(
    State(controller): State<Arc<ResourceController>>,
    ctx: Context,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = controller.get_one(&ctx, &id).await?;
    Ok(success(row))
}

pub async fn post(
    State(controller): State<Arc<ResourceController>>,
    ctx: Context,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = body(payload)?;
    let row = controller.post(&ctx, &payload).await?;
    Ok(success(row))
}

pub async fn patch(
    State(controller): State<Arc<ResourceController>>,
    ctx: Context,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = body(payload)?;
    let row = controller.patch(&ctx, &id, &payload).await?;
    Ok(success(row))
}

pub async fn delete(
    State(controller): State<Arc<ResourceController>>,
    ctx: Context,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = controller.delete(&ctx, &id).await?;
    Ok(success(row))
}
