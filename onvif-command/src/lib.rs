pub mod client;
pub mod clock;
pub mod dispatcher;
pub mod duration;
pub mod error;
pub mod http_client;
pub mod replay;
pub mod search;
pub mod service;
pub mod soap;
pub mod wsse;
pub mod xml_tree;

pub use client::ServiceClient;
pub use clock::ClockOffset;
pub use dispatcher::CommandResponse;
pub use error::{CommandError, ProtocolFault, TransportError, ValidationError};
pub use http_client::{HttpTransport, RawReply, ReqwestTransport};
pub use replay::ReplayService;
pub use search::SearchService;
pub use service::{Command, ServiceEndpoint};
pub use wsse::Credentials;
pub use xml_tree::ElementExt;
