//! The host side of the host-does-IO split.

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// Executes one HTTP round-trip on behalf of the core.
///
/// Non-2xx statuses are responses, not errors: implementations return them
/// as `HttpResponse` and leave interpretation to the client. `Err` is only
/// for round-trips that produced no response, as `ApiError::Transport`.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, ApiError>,
{
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self(request)
    }
}
