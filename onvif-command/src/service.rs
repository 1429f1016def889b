use crate::error::ValidationError;
use crate::wsse::Credentials;
use xmltree::Element;

pub const SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";
pub const SEARCH_NS: &str = "http://www.onvif.org/ver10/search/wsdl";
pub const REPLAY_NS: &str = "http://www.onvif.org/ver10/replay/wsdl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

impl Namespace {
    pub fn declaration(&self) -> String {
        format!("xmlns:{}", self.prefix)
    }
}

pub const SCHEMA_NAMESPACE: Namespace = Namespace {
    prefix: "tt",
    uri: SCHEMA_NS,
};

/// Static description of one ONVIF service: the WSDL namespace that
/// qualifies its actions and the ordered namespace declarations its command
/// bodies rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub wsdl_namespace: &'static str,
    pub namespaces: &'static [Namespace],
}

impl ServiceDescriptor {
    pub fn action(&self, operation: &str) -> String {
        format!("{}/{}", self.wsdl_namespace, operation)
    }

    pub fn declares(&self, prefix: &str) -> bool {
        self.namespaces
            .iter()
            .any(|namespace| namespace.prefix == prefix)
    }
}

pub const SEARCH_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "search",
    wsdl_namespace: SEARCH_NS,
    namespaces: &[
        Namespace {
            prefix: "tse",
            uri: SEARCH_NS,
        },
        SCHEMA_NAMESPACE,
    ],
};

pub const REPLAY_SERVICE: ServiceDescriptor = ServiceDescriptor {
    name: "replay",
    wsdl_namespace: REPLAY_NS,
    namespaces: &[
        Namespace {
            prefix: "trp",
            uri: REPLAY_NS,
        },
        SCHEMA_NAMESPACE,
    ],
};

/// Address and credentials of one service on one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    xaddr: String,
    credentials: Option<Credentials>,
}

impl ServiceEndpoint {
    pub fn new(xaddr: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            xaddr: xaddr.into(),
            credentials,
        }
    }

    pub fn xaddr(&self) -> &str {
        &self.xaddr
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

/// One ONVIF operation: its name and the rule that renders its body.
pub trait Command {
    const OPERATION: &'static str;

    fn build_body(&self) -> Result<Element, ValidationError>;
}

pub(crate) fn require_token(path: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    mod success {
        use crate::service::{REPLAY_SERVICE, SEARCH_SERVICE};

        #[test]
        fn action_is_qualified_by_wsdl_namespace() {
            assert_eq!(
                SEARCH_SERVICE.action("FindRecordings"),
                "http://www.onvif.org/ver10/search/wsdl/FindRecordings"
            );
            assert_eq!(
                REPLAY_SERVICE.action("GetReplayUri"),
                "http://www.onvif.org/ver10/replay/wsdl/GetReplayUri"
            );
        }

        #[test]
        fn services_declare_own_and_schema_prefixes() {
            assert!(SEARCH_SERVICE.declares("tse"));
            assert!(SEARCH_SERVICE.declares("tt"));
            assert!(!SEARCH_SERVICE.declares("trp"));
            assert!(REPLAY_SERVICE.declares("trp"));
            assert!(REPLAY_SERVICE.declares("tt"));
        }
    }

    mod failure {
        use crate::error::ValidationError;
        use crate::service::require_token;

        #[test]
        fn blank_token_is_missing() {
            assert_eq!(
                require_token("RecordingToken", "  "),
                Err(ValidationError::MissingField("RecordingToken".to_string()))
            );
        }
    }
}
