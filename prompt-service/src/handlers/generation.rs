//! `POST /generate`, `POST /explain` and the read-only record endpoints.

use crate::dtos::{
    ExplainRequest, GenerateRequest, GenerationResponse, ListRecordsQuery, RecordListResponse,
    RecordResponse,
};
use crate::models::{ListRecords, Variant};
use crate::services::RequestHandler;
use crate::startup::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// Response header carrying the id of the record written for the request.
pub const RECORD_ID_HEADER: &str = "x-record-id";

pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(json_rejection)?;
    validate_body(&req)?;

    run(&state.generate, &req.prompt.unwrap_or_default()).await
}

pub async fn explain(
    State(state): State<AppState>,
    payload: Result<Json<ExplainRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(json_rejection)?;
    validate_body(&req)?;

    run(&state.explain, &req.code.unwrap_or_default()).await
}

pub async fn get_generation(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<RecordResponse>, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    fetch(&state.generate, id).await
}

pub async fn get_explanation(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<RecordResponse>, AppError> {
    let Path(id) = id.map_err(path_rejection)?;
    fetch(&state.explain, id).await
}

pub async fn list_generations(
    State(state): State<AppState>,
    query: Result<Query<ListRecordsQuery>, QueryRejection>,
) -> Result<Json<RecordListResponse>, AppError> {
    let Query(query) = query.map_err(query_rejection)?;
    list(&state.generate, query.into()).await
}

pub async fn list_explanations(
    State(state): State<AppState>,
    query: Result<Query<ListRecordsQuery>, QueryRejection>,
) -> Result<Json<RecordListResponse>, AppError> {
    let Query(query) = query.map_err(query_rejection)?;
    list(&state.explain, query.into()).await
}

async fn run(
    handler: &RequestHandler,
    input_text: &str,
) -> Result<(HeaderMap, Json<GenerationResponse>), AppError> {
    let generation = handler.handle(input_text).await?;

    let mut headers = HeaderMap::new();
    headers.insert(RECORD_ID_HEADER, HeaderValue::from(generation.record_id));

    Ok((
        headers,
        Json(GenerationResponse {
            text: generation.output_text,
        }),
    ))
}

async fn fetch(handler: &RequestHandler, id: i64) -> Result<Json<RecordResponse>, AppError> {
    let record = handler
        .store()
        .get(id)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?
        .ok_or_else(|| not_found(handler.variant(), id))?;

    Ok(Json(record.into()))
}

async fn list(
    handler: &RequestHandler,
    page: ListRecords,
) -> Result<Json<RecordListResponse>, AppError> {
    let records = handler
        .store()
        .list(page)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;

    Ok(Json(RecordListResponse::new(records, page)))
}

fn not_found(variant: Variant, id: i64) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No {} record with id {}", variant, id))
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(
        "Invalid request body: {}",
        rejection.body_text()
    ))
}

fn path_rejection(rejection: PathRejection) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Invalid record id: {}", rejection.body_text()))
}

fn query_rejection(rejection: QueryRejection) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(
        "Invalid query parameters: {}",
        rejection.body_text()
    ))
}

/// Missing or empty input is a 400, reported with the field's own message.
fn validate_body<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .next()
            .unwrap_or_else(|| errors.to_string());
        AppError::BadRequest(anyhow::anyhow!(message))
    })
}
