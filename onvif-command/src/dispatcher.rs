use crate::error::{CommandError, ProtocolFault, TransportError};
use crate::http_client::{HttpTransport, RawReply};
use crate::soap::CommandEnvelope;
use crate::xml_tree::{from_node, ElementExt};
use roxmltree::{Document, Node};
use serde_json::Value;
use xmltree::Element;

/// Parsed reply of a successful command. `data` is the response element
/// inside `Body`; `raw` is the reply exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    operation: &'static str,
    status: u16,
    data: Element,
    raw: String,
}

impl CommandResponse {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn data(&self) -> &Element {
        &self.data
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn to_json(&self) -> Value {
        self.data.to_json()
    }
}

pub async fn dispatch<T>(
    transport: &T,
    envelope: CommandEnvelope,
) -> Result<CommandResponse, CommandError>
where
    T: HttpTransport + ?Sized,
{
    let operation = envelope.operation();
    tracing::debug!(operation, endpoint = envelope.endpoint(), "sending SOAP request");
    let reply = match transport
        .send(envelope.endpoint(), envelope.headers(), envelope.body())
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(operation, endpoint = envelope.endpoint(), "transport failure: {err}");
            return Err(err.into());
        }
    };
    tracing::trace!(operation, status = reply.status, body = %reply.body, "SOAP reply");

    let outcome = classify_reply(operation, reply);
    match &outcome {
        Ok(response) => {
            tracing::info!(operation, status = response.status, "command succeeded")
        }
        Err(CommandError::Fault(fault)) => tracing::warn!(
            operation,
            status = fault.status,
            code = %fault.code,
            subcode = fault.subcode().unwrap_or_default(),
            "device fault: {}",
            fault.reason
        ),
        Err(err) => tracing::warn!(operation, "command failed: {err}"),
    }
    outcome
}

pub fn classify_reply(
    operation: &'static str,
    reply: RawReply,
) -> Result<CommandResponse, CommandError> {
    let RawReply { status, body } = reply;
    let data = inspect_envelope(status, &body)?;
    Ok(CommandResponse {
        operation,
        status,
        data,
        raw: body,
    })
}

fn inspect_envelope(status: u16, body: &str) -> Result<Element, CommandError> {
    let success = (200..300).contains(&status);
    let doc = match Document::parse(body) {
        Ok(doc) => doc,
        Err(_) if !success => return Err(http_status(status, body)),
        Err(err) => {
            return Err(TransportError::MalformedReply(format!("invalid XML: {err}")).into())
        }
    };
    let root = doc.root_element();
    if root.tag_name().name() != "Envelope" {
        if !success {
            return Err(http_status(status, body));
        }
        return Err(TransportError::MalformedReply(format!(
            "root element is <{}>, expected Envelope",
            root.tag_name().name()
        ))
        .into());
    }
    let soap_body = child_element(root, "Body")
        .ok_or_else(|| TransportError::MalformedReply("envelope has no Body".to_string()))?;
    let payload = soap_body.children().find(|node| node.is_element());
    if let Some(fault) = payload.filter(|node| node.tag_name().name() == "Fault") {
        return Err(extract_fault(status, fault).into());
    }
    if !success {
        return Err(http_status(status, body));
    }
    Ok(from_node(payload.unwrap_or(soap_body)))
}

fn http_status(status: u16, body: &str) -> CommandError {
    TransportError::HttpStatus {
        status,
        body: body.to_string(),
    }
    .into()
}

/// Reads a SOAP 1.2 fault (`Code`/`Subcode`/`Reason`) or, failing that, a
/// SOAP 1.1 one (`faultcode`/`faultstring`).
fn extract_fault(status: u16, fault: Node<'_, '_>) -> ProtocolFault {
    if let Some(code) = child_element(fault, "Code") {
        let mut subcodes = Vec::new();
        let mut level = child_element(code, "Subcode");
        while let Some(subcode) = level {
            if let Some(value) = child_text(subcode, "Value") {
                subcodes.push(value.trim().to_string());
            }
            level = child_element(subcode, "Subcode");
        }
        let reason = child_element(fault, "Reason")
            .and_then(|reason| child_text(reason, "Text"))
            .unwrap_or_default()
            .to_string();
        return ProtocolFault {
            status,
            code: child_text(code, "Value")
                .unwrap_or_default()
                .trim()
                .to_string(),
            subcodes,
            reason,
            detail: child_element(fault, "Detail").map(render_detail),
        };
    }
    ProtocolFault {
        status,
        code: child_text(fault, "faultcode")
            .unwrap_or_default()
            .trim()
            .to_string(),
        subcodes: Vec::new(),
        reason: child_text(fault, "faultstring")
            .unwrap_or_default()
            .to_string(),
        detail: child_element(fault, "detail").map(render_detail),
    }
}

/// Child elements of `Detail` exactly as the device wrote them.
fn render_detail(detail: Node<'_, '_>) -> String {
    let input = detail.document().input_text();
    let inner: String = detail
        .children()
        .filter(Node::is_element)
        .map(|child| &input[child.range()])
        .collect();
    if inner.is_empty() {
        detail.text().map(str::trim).unwrap_or_default().to_string()
    } else {
        inner
    }
}

fn child_element<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child_element(node, name).and_then(|child| child.text())
}
