use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::domain::{AbortSignal, ClientError, GenerateRequestBody};

const API_PATH: &str = "/api/ai";
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries one generation request to the server. Implementations must return
/// `ClientError::Aborted` promptly once `abort` is raised.
pub trait GenerationTransport: Send + Sync {
    fn send(
        &self,
        body: &GenerateRequestBody,
        abort: &AbortSignal,
    ) -> Result<TransportResponse, ClientError>;
}

pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ClientError::Transport {
                message: "server URL must not be empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Transport {
                message: format!("failed to create HTTP client: {err}"),
            })?;

        Ok(Self { base_url, client })
    }

    fn endpoint_url(&self) -> String {
        format!("{}{API_PATH}", self.base_url.trim().trim_end_matches('/'))
    }
}

impl GenerationTransport for HttpTransport {
    fn send(
        &self,
        body: &GenerateRequestBody,
        abort: &AbortSignal,
    ) -> Result<TransportResponse, ClientError> {
        if abort.is_aborted() {
            return Err(ClientError::Aborted);
        }

        let request = self.client.post(self.endpoint_url()).json(body);
        let (result_tx, result_rx) = mpsc::channel();

        // The blocking call cannot be interrupted; an aborted caller simply
        // stops waiting and the late result is dropped with the channel.
        thread::Builder::new()
            .name("aibot-api-request".to_string())
            .spawn(move || {
                let result = request
                    .send()
                    .and_then(|response| {
                        let status = response.status().as_u16();
                        response
                            .text()
                            .map(|body| TransportResponse { status, body })
                    })
                    .map_err(|err| ClientError::Transport {
                        message: err.to_string(),
                    });
                let _ = result_tx.send(result);
            })
            .map_err(|err| ClientError::Transport {
                message: format!("failed to start request thread: {err}"),
            })?;

        loop {
            if abort.is_aborted() {
                debug!("abandoning in-flight request after abort");
                return Err(ClientError::Aborted);
            }

            match result_rx.recv_timeout(ABORT_POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ClientError::Transport {
                        message: "request thread exited without a response".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{HttpTransport, TransportResponse};
    use crate::domain::ClientError;

    #[test]
    fn endpoint_url_appends_api_path_once() {
        let transport = HttpTransport::new("http://127.0.0.1:3000/", Duration::from_secs(1))
            .expect("transport should build");

        assert_eq!(transport.endpoint_url(), "http://127.0.0.1:3000/api/ai");
    }

    #[test]
    fn new_rejects_blank_server_url() {
        let error = match HttpTransport::new("  ", Duration::from_secs(1)) {
            Ok(_) => panic!("blank URL should fail"),
            Err(error) => error,
        };

        assert!(matches!(error, ClientError::Transport { .. }));
    }

    #[test]
    fn transport_response_success_covers_2xx_only() {
        let ok = TransportResponse {
            status: 200,
            body: String::new(),
        };
        let bad = TransportResponse {
            status: 400,
            body: String::new(),
        };

        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
