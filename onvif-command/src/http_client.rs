use crate::error::TransportError;
use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

/// POSTs one SOAP envelope and returns whatever the device answered.
/// Non-2xx statuses are replies too; only a missing reply is an error.
#[automock]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<RawReply, TransportError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        endpoint: &str,
        headers: &[(String, String)],
        body: &str,
    ) -> Result<RawReply, TransportError> {
        let mut request = self.client.post(endpoint);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| classify(endpoint, err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| classify(endpoint, err))?;
        Ok(RawReply { status, body })
    }
}

fn classify(endpoint: &str, err: reqwest::Error) -> TransportError {
    let endpoint = endpoint.to_string();
    if err.is_timeout() {
        return TransportError::Timeout { endpoint };
    }
    let cause = error_chain(&err);
    if err.is_connect() {
        TransportError::Connect { endpoint, cause }
    } else {
        TransportError::Request { endpoint, cause }
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
