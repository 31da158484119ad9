//! Blocking HTTP transport backed by ureq.

use todo_core::{ApiError, HttpMethod, HttpRequest, HttpResponse, Transport};

/// Executes core requests over the network.
///
/// ureq's status-as-error behaviour is turned off so 4xx/5xx come back as
/// responses and the core decides what they mean.
#[derive(Debug, Clone)]
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
    fn execute(&self, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = req.url.as_str();
        let result = match req.method {
            HttpMethod::Get => with_headers(self.agent.get(url), req).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), req).call(),
            HttpMethod::Post => send(with_headers(self.agent.post(url), req), req.body.as_deref()),
            HttpMethod::Put => send(with_headers(self.agent.put(url), req), req.body.as_deref()),
        };

        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        tracing::debug!(method = req.method.as_str(), url = %req.url, status, "response");
        Ok(HttpResponse::new(status, body))
    }
}

/// Forwards every header the core put on the request.
fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, req: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}
