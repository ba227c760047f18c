//! Schema listing handlers.
//!
//! Serves the example form definitions (`.md` files) from the configured
//! schemas directory so a client can browse and pick one.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use formpilot_core::form::markdown::extract_form_title;

use crate::http::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SchemaInfo {
    pub filename: String,
    pub title: String,
    pub size: usize,
}

/// GET /api/schemas - list available example schema files.
pub async fn list_schemas(State(state): State<AppState>) -> Json<Value> {
    let mut schemas: Vec<SchemaInfo> = Vec::new();

    if let Ok(mut dir) = tokio::fs::read_dir(&state.config.schemas_dir).await {
        while let Ok(Some(dir_entry)) = dir.next_entry().await {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let filename = dir_entry.file_name().to_string_lossy().to_string();
            let title = extract_form_title(&content)
                .unwrap_or_else(|| filename.trim_end_matches(".md").to_string());
            schemas.push(SchemaInfo {
                filename,
                title,
                size: content.len(),
            });
        }
    }

    schemas.sort_by(|a, b| a.filename.cmp(&b.filename));
    Json(json!({ "schemas": schemas }))
}

/// GET /api/schemas/{filename} - get a specific schema file's content.
pub async fn get_schema(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<Value>, AppError> {
    // A path separator would escape the schemas directory.
    if filename.contains('/') || filename.contains("..") {
        return Err(AppError::NotFound(format!("Schema '{filename}' not found")));
    }

    let path = std::path::Path::new(&state.config.schemas_dir).join(&filename);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Json(json!({ "filename": filename, "content": content }))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(AppError::NotFound(format!("Schema '{filename}' not found")))
        }
        Err(err) => Err(AppError::Internal(format!(
            "Error reading schema file '{filename}': {err}"
        ))),
    }
}
