//! HTTPS transport backed by `ureq`.
//!
//! Appliances usually ship self-signed certificates, so verification can be
//! turned off per [`ClientConfig`]. Status codes are never turned into
//! errors here: the body of a 4xx/5xx answer is read and handed back so
//! callers can include it in diagnostics.

use super::{ApiRequest, ClientConfig, Method, RawResponse, Transport};
use crate::error::{Error, Result};
use log::{debug, trace};

/// Blocking HTTPS transport with basic authentication.
///
/// # Example
///
/// ```no_run
/// use opnsense::transport::{ApiRequest, ClientConfig, Credentials, HttpTransport, Transport};
///
/// let config = ClientConfig::new("https://192.168.1.1", Credentials::new("key", "secret"));
/// let transport = HttpTransport::new(&config);
/// let reply = transport
///     .send(&ApiRequest::get("https://192.168.1.1/api/core/firmware/status"))
///     .unwrap();
/// println!("{}", reply.status);
/// ```
pub struct HttpTransport {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Precomputed `Authorization` header.
    authorization: String,
}

impl HttpTransport {
    /// Create a transport from a client config.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout));
        if config.insecure {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        let agent: ureq::Agent = builder.build().into();

        Self {
            agent,
            authorization: config.credentials.basic_auth(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        debug!("{} {}", request.method, request.url);
        let failed = |e: ureq::Error| Error::transport(&request.url, e.to_string());

        let mut response = match request.method {
            Method::Get => self
                .agent
                .get(&request.url)
                .header("Authorization", &self.authorization)
                .header("Accept", "application/json")
                .call()
                .map_err(failed)?,
            Method::Post => {
                let builder = self
                    .agent
                    .post(&request.url)
                    .header("Authorization", &self.authorization)
                    .header("Accept", "application/json");
                match &request.body {
                    Some(body) => {
                        let payload = body.to_string();
                        builder
                            .header("Content-Type", "application/json")
                            .send(payload.as_bytes())
                            .map_err(failed)?
                    }
                    None => builder.send_empty().map_err(failed)?,
                }
            }
        };

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().map_err(failed)?;
        trace!("{} {} -> {status}: {body}", request.method, request.url);

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Credentials;
    use std::time::Duration;

    #[test]
    fn test_new_precomputes_authorization() {
        let config = ClientConfig::new("https://fw", Credentials::new("key", "secret"));
        let transport = HttpTransport::new(&config);
        assert_eq!(transport.authorization, "Basic a2V5OnNlY3JldA==");
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let config = ClientConfig::new("http://127.0.0.1:1", Credentials::new("k", "s"))
            .timeout(Duration::from_secs(2));
        let transport = HttpTransport::new(&config);
        let err = transport
            .send(&ApiRequest::get("http://127.0.0.1:1/api/core/firmware/status"))
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
