//! Thin async wrapper over a blocking `ureq` agent.
//!
//! Calls run on the blocking pool so they never stall the runtime; the
//! agent carries the per-request timeout.

use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String, body: String },

    /// Connection, DNS, TLS or timeout failure.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("invalid response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("request task aborted: {0}")]
    Aborted(String),
}

/// Shared HTTP client for directory, geocoding and IP lookups.
#[derive(Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(user_agent)
            .build();
        Self { agent }
    }

    /// GET `url` with query parameters and decode a JSON body.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> Result<T, HttpError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = url.to_string();
        let query: Vec<(String, String)> =
            query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&url);
            for (k, v) in &query {
                request = request.query(k, v);
            }
            match request.call() {
                Ok(response) => response.into_json::<T>().map_err(|e| HttpError::Decode {
                    url: url.clone(),
                    message: e.to_string(),
                }),
                Err(ureq::Error::Status(status, response)) => Err(HttpError::Status {
                    status,
                    url: url.clone(),
                    body: response.into_string().unwrap_or_default(),
                }),
                Err(ureq::Error::Transport(t)) => Err(HttpError::Transport {
                    url: url.clone(),
                    message: t.to_string(),
                }),
            }
        })
        .await
        .map_err(|e| HttpError::Aborted(e.to_string()))?
    }
}
