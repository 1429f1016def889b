use crate::clock::{format_created, ClockOffset};
use crate::error::ValidationError;
use crate::service::{ServiceDescriptor, ServiceEndpoint};
use crate::wsse::{generate_nonce, UsernameToken};
use crate::xml_tree::{self, ElementExt};
use time::OffsetDateTime;
use xmltree::Element;

pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const ENVELOPE_PREFIX: &str = "s";
const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// A fully rendered request, ready to be handed to the transport once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEnvelope {
    operation: &'static str,
    endpoint: String,
    action: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl CommandEnvelope {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Timestamp and nonce for one security header. The timestamp is already
/// corrected for the device clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityStamp {
    created: OffsetDateTime,
    nonce: Vec<u8>,
}

impl SecurityStamp {
    pub fn new(created: OffsetDateTime, nonce: Vec<u8>) -> Self {
        Self { created, nonce }
    }

    /// Stamp for a request sent now, shifted by `offset`.
    pub fn now(offset: ClockOffset) -> Self {
        Self::new(offset.corrected_now(), generate_nonce())
    }
}

/// Wraps a command body in a SOAP 1.2 envelope carrying the service's
/// namespace declarations and, when the endpoint has credentials, a
/// WS-Security header.
pub fn assemble(
    descriptor: &ServiceDescriptor,
    endpoint: &ServiceEndpoint,
    operation: &'static str,
    body: Element,
    stamp: &SecurityStamp,
) -> Result<CommandEnvelope, ValidationError> {
    if let Some(prefix) = body
        .required_prefixes()
        .into_iter()
        .find(|prefix| prefix != ENVELOPE_PREFIX && !descriptor.declares(prefix))
    {
        return Err(ValidationError::UndeclaredPrefix(prefix));
    }

    let mut envelope = Element::new("s:Envelope").with_attr("xmlns:s", SOAP_ENV_NS);
    for namespace in descriptor.namespaces {
        envelope = envelope.with_attr(&namespace.declaration(), namespace.uri);
    }
    if let Some(credentials) = endpoint.credentials() {
        let created = format_created(stamp.created)
            .map_err(|err| ValidationError::invalid("Created", err.to_string()))?;
        let token = UsernameToken::new(credentials, &created, &stamp.nonce);
        envelope = envelope
            .with_child(Element::new("s:Header").with_child(token.to_security_header()));
    }
    let envelope = envelope.with_child(Element::new("s:Body").with_child(body));
    envelope.check_chars()?;
    let body = xml_tree::write_document(&envelope)?;

    let action = descriptor.action(operation);
    let headers = vec![
        (
            "Content-Type".to_string(),
            format!(r#"{}; action="{}""#, CONTENT_TYPE, action),
        ),
        ("SOAPAction".to_string(), format!(r#""{}""#, action)),
    ];
    tracing::debug!(
        service = descriptor.name,
        operation,
        endpoint = endpoint.xaddr(),
        "assembled SOAP envelope"
    );
    Ok(CommandEnvelope {
        operation,
        endpoint: endpoint.xaddr().to_string(),
        action,
        headers,
        body,
    })
}
