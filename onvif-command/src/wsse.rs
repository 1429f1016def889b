use crate::xml_tree::{leaf, ElementExt};
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha1::{Digest, Sha1};
use std::fmt;
use xmltree::Element;

const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const NS_WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";
const NONCE_LEN: usize = 20;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// UsernameToken with a SHA-1 password digest. Only the digest leaves this
/// type; the clear password is never rendered.
pub struct UsernameToken {
    username: String,
    digest: String,
    nonce: String,
    created: String,
}

impl UsernameToken {
    pub fn new(credentials: &Credentials, created: &str, nonce: &[u8]) -> Self {
        Self {
            username: credentials.username.clone(),
            digest: password_digest(nonce, created, &credentials.password),
            nonce: general_purpose::STANDARD.encode(nonce),
            created: created.to_string(),
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn to_security_header(&self) -> Element {
        Element::new("wsse:Security")
            .with_attr("s:mustUnderstand", "1")
            .with_attr("xmlns:wsse", NS_WSSE)
            .with_attr("xmlns:wsu", NS_WSU)
            .with_child(
                Element::new("wsse:UsernameToken")
                    .with_child(leaf("wsse:Username", self.username.as_str()))
                    .with_child(
                        leaf("wsse:Password", self.digest.as_str())
                            .with_attr("Type", PASSWORD_DIGEST_TYPE),
                    )
                    .with_child(
                        leaf("wsse:Nonce", self.nonce.as_str())
                            .with_attr("EncodingType", NONCE_ENCODING),
                    )
                    .with_child(leaf("wsu:Created", self.created.as_str())),
            )
    }
}

pub fn generate_nonce() -> Vec<u8> {
    let mut bytes = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    general_purpose::STANDARD.encode(digest)
}
