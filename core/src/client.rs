//! Stateless HTTP request builder and response parser for one resource
//! collection.
//!
//! # Design
//! `ResourceClient` holds only the base URL and the resource path. Each CRUD
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes an `HttpResponse`. The caller executes
//! the round-trip, so every failure mode can be exercised without a network.

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{ContentRange, ErrorBody, Fields, Item, ItemId, Page, PageRequest};

const CONTENT_RANGE: &str = "content-range";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceClient {
    base_url: String,
    resource: String,
}

impl ResourceClient {
    /// `resource` is the collection path segment, e.g. `"tasks"` or `"/tasks"`.
    pub fn new(base_url: &str, resource: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            resource: resource.trim_matches('/').to_string(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.resource)
    }

    fn item_url(&self, id: ItemId) -> String {
        format!("{}/{}/{id}", self.base_url, self.resource)
    }

    pub fn build_list(&self, page: Option<PageRequest>) -> HttpRequest {
        let path = match page {
            Some(page) => format!("{}?{}", self.collection_url(), page.query()),
            None => self.collection_url(),
        };
        HttpRequest {
            method: HttpMethod::Get,
            path,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_get(&self, id: ItemId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: self.item_url(id),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn build_create(&self, fields: &Fields) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: self.collection_url(),
            headers: json_headers(),
            body: Some(json_body(fields)?),
        })
    }

    pub fn build_update(&self, id: ItemId, fields: &Fields) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Patch,
            path: self.item_url(id),
            headers: json_headers(),
            body: Some(json_body(fields)?),
        })
    }

    pub fn build_delete(&self, id: ItemId) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Delete,
            path: self.item_url(id),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Page, ApiError> {
        check_status(&response, 200)?;
        let range = response
            .header(CONTENT_RANGE)
            .map(str::parse::<ContentRange>)
            .transpose()?;
        let items: Vec<Item> =
            serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if items.iter().any(|item| item.id.is_none()) {
            return Err(ApiError::Deserialization("listed item has no id".to_string()));
        }
        Ok(Page { items, range })
    }

    pub fn parse_get(&self, response: HttpResponse) -> Result<Item, ApiError> {
        check_status(&response, 200)?;
        parse_saved_item(&response.body)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<Item, ApiError> {
        check_status(&response, 201)?;
        parse_saved_item(&response.body)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<Item, ApiError> {
        check_status(&response, 200)?;
        parse_saved_item(&response.body)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 204)?;
        Ok(())
    }
}

fn json_headers() -> Vec<(String, String)> {
    vec![("content-type".to_string(), "application/json".to_string())]
}

/// Serialize a payload. The server owns `id`, so it is never sent.
fn json_body(fields: &Fields) -> Result<String, ApiError> {
    let mut payload = fields.clone();
    payload.remove("id");
    serde_json::to_string(&payload).map_err(|e| ApiError::Serialization(e.to_string()))
}

fn parse_saved_item(body: &str) -> Result<Item, ApiError> {
    let item: Item = serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    if item.id.is_none() {
        return Err(ApiError::Deserialization("item has no id".to_string()));
    }
    Ok(item)
}

/// Map an unexpected status to the matching `ApiError` variant, pulling the
/// server's structured error out of the body when there is one.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }

    let error_body = serde_json::from_str::<ErrorBody>(&response.body).ok();
    let message = error_body
        .as_ref()
        .map(|body| body.error_message.clone())
        .unwrap_or_else(|| fallback_message(response.status));

    Err(match response.status {
        404 => ApiError::NotFound { message },
        400 | 422 => ApiError::ValidationFailed {
            status: response.status,
            message,
            details: error_body
                .and_then(|body| body.error_details)
                .unwrap_or_default(),
        },
        409 => ApiError::Conflict { message },
        status => ApiError::Http {
            status,
            message,
            body: response.body.clone(),
        },
    })
}

fn fallback_message(status: u16) -> String {
    match status {
        404 => "resource not found".to_string(),
        400 | 422 => "invalid payload".to_string(),
        409 => "conflict".to_string(),
        status => format!("unexpected status {status}"),
    }
}
