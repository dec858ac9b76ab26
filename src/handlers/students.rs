use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::store::{RecordStore, Student};
use crate::AppState;

use super::AppError;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

// ─── GET /api/students/:name ─────────────────────────────────────

pub async fn get_student<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<Student>, AppError> {
    match state.store.fetch(&name).await? {
        Some(student) => Ok(Json(student)),
        None => Err(AppError::NotFound(format!("student '{name}' not found"))),
    }
}

// ─── POST /api/students ──────────────────────────────────────────

pub async fn create_student<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(student): Json<Student>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    if student.name.trim().is_empty() {
        return Err(AppError::BadRequest("student name must not be empty".into()));
    }

    if !state.store.insert(student.clone()).await? {
        return Err(AppError::AlreadyExists(format!(
            "student '{}' already exists",
            student.name
        )));
    }

    Ok((StatusCode::CREATED, Json(student)))
}

// ─── PUT /api/students/:name ─────────────────────────────────────
/// Rewrites the row found under `name` with the submitted record.
/// The record may carry a different name, which renames the row.

pub async fn update_student<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
    Json(student): Json<Student>,
) -> Result<Json<Student>, AppError> {
    if student.name.trim().is_empty() {
        return Err(AppError::BadRequest("student name must not be empty".into()));
    }

    if !state.store.update(&name, student.clone()).await? {
        return Err(AppError::NotFound(format!("student '{name}' not found")));
    }

    Ok(Json(student))
}

// ─── DELETE /api/students/:name ──────────────────────────────────

pub async fn delete_student<S: RecordStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(name): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if !state.store.remove(&name).await? {
        return Err(AppError::NotFound(format!("student '{name}' not found")));
    }

    Ok(Json(DeleteResponse { success: true }))
}
