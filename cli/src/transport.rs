use resource_core::{ApiError, HttpMethod, HttpRequest, HttpResponse, Transport};
use tracing::debug;

/// Executes core requests over blocking HTTP.
///
/// ureq's status-as-error behavior is disabled: 4xx/5xx responses come back
/// as data for the core client to interpret.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.path, "sending request");

        let path = request.path.as_str();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => self.agent.get(path).call(),
            (HttpMethod::Delete, _) => self.agent.delete(path).call(),
            (HttpMethod::Post, Some(body)) => self
                .agent
                .post(path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Post, None) => self.agent.post(path).send_empty(),
            (HttpMethod::Patch, Some(body)) => self
                .agent
                .patch(path)
                .content_type("application/json")
                .send(body.as_bytes()),
            (HttpMethod::Patch, None) => self.agent.patch(path).send_empty(),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        debug!(status, "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
