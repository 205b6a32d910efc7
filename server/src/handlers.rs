//! Request handlers shared by every resource collection.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ServerError;
use crate::pagination::PageParams;
use crate::repository::{Record, RecordId};
use crate::resources::{Registry, Resource};
use crate::validation::{validate, Mode};

pub type AppState = Arc<Registry>;

/// An id that does not parse cannot name an existing row.
fn parse_id(resource: &Resource, raw: &str) -> Result<RecordId, ServerError> {
    raw.parse().map_err(|_| not_found(resource, raw))
}

fn not_found(resource: &Resource, id: impl std::fmt::Display) -> ServerError {
    ServerError::NotFound(format!("{} {id}", resource.name))
}

pub async fn list_items(
    State(registry): State<AppState>,
    Path(resource): Path<String>,
    query: Result<Query<PageParams>, QueryRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let resource = registry.resource(&resource)?;
    // An unreadable query string means no usable pagination input.
    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(resource = resource.name, %rejection, "ignoring query string");
            PageParams::default()
        }
    };
    let window = params.window();
    let page = resource
        .repository
        .get_some(window.limit(), window.offset())
        .await?;
    let range = window.content_range(page.total);
    debug!(resource = resource.name, %range, "listed");

    Ok(([(header::CONTENT_RANGE, range.to_string())], Json(page.results)))
}

pub async fn get_item(
    State(registry): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Record>, ServerError> {
    let resource = registry.resource(&resource)?;
    let id = parse_id(resource, &id)?;
    resource
        .repository
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(resource, id))
}

pub async fn create_item(
    State(registry): State<AppState>,
    Path(resource): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), ServerError> {
    let resource = registry.resource(&resource)?;
    let Json(payload) = body?;
    let fields = validate(resource.rules, &payload, Mode::Create)?;
    let record = resource.repository.create(fields).await?;
    info!(resource = resource.name, id = record.id, "created");

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_item(
    State(registry): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Record>, ServerError> {
    let resource = registry.resource(&resource)?;
    let id = parse_id(resource, &id)?;
    let Json(payload) = body?;
    let fields = validate(resource.rules, &payload, Mode::Update)?;
    let record = resource
        .repository
        .update_by_id(id, fields)
        .await?
        .ok_or_else(|| not_found(resource, id))?;
    info!(resource = resource.name, id, "updated");

    Ok(Json(record))
}

pub async fn delete_item(
    State(registry): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let resource = registry.resource(&resource)?;
    let id = parse_id(resource, &id)?;
    if !resource.repository.delete_by_id(id).await? {
        return Err(not_found(resource, id));
    }
    info!(resource = resource.name, id, "deleted");

    Ok(StatusCode::NO_CONTENT)
}
