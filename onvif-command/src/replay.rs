use crate::client::ServiceClient;
use crate::clock::ClockOffset;
use crate::dispatcher::CommandResponse;
use crate::duration::xs_duration;
use crate::error::{CommandError, TransportError, ValidationError};
use crate::http_client::{HttpTransport, ReqwestTransport};
use crate::service::{require_token, Command, ServiceEndpoint, REPLAY_SERVICE};
use crate::xml_tree::{leaf, raw_fragment, ElementExt};
use serde::Deserialize;
use strum::{AsRefStr, EnumString};
use xmltree::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, AsRefStr, EnumString)]
pub enum StreamType {
    #[serde(rename = "RTP-Unicast")]
    #[strum(serialize = "RTP-Unicast")]
    RtpUnicast,
    #[serde(rename = "RTP-Multicast")]
    #[strum(serialize = "RTP-Multicast")]
    RtpMulticast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TransportProtocol {
    Udp,
    Tcp,
    Rtsp,
    Http,
}

/// `tunnel` is an opaque escape hatch rendered verbatim inside `tt:Tunnel`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transport {
    pub protocol: TransportProtocol,
    pub tunnel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamSetup {
    pub stream: StreamType,
    pub transport: Transport,
}

impl StreamSetup {
    pub fn new(stream: StreamType, protocol: TransportProtocol) -> Self {
        Self {
            stream,
            transport: Transport {
                protocol,
                tunnel: None,
            },
        }
    }

    fn to_element(&self) -> Result<Element, ValidationError> {
        let tunnel = match self
            .transport
            .tunnel
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        {
            Some(raw) => Some(
                Element::new("tt:Tunnel")
                    .with_nodes(raw_fragment("StreamSetup.Transport.Tunnel", raw)?),
            ),
            None => None,
        };
        Ok(Element::new("trp:StreamSetup")
            .with_child(leaf("tt:Stream", self.stream.as_ref()))
            .with_child(
                Element::new("tt:Transport")
                    .with_child(leaf("tt:Protocol", self.transport.protocol.as_ref()))
                    .with_opt(tunnel),
            ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetReplayUriParams {
    pub stream_setup: StreamSetup,
    pub recording_token: String,
}

impl Command for GetReplayUriParams {
    const OPERATION: &'static str = "GetReplayUri";

    fn build_body(&self) -> Result<Element, ValidationError> {
        require_token("RecordingToken", &self.recording_token)?;
        Ok(Element::new("trp:GetReplayUri")
            .with_child(self.stream_setup.to_element()?)
            .with_child(leaf("trp:RecordingToken", self.recording_token.as_str())))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetReplayConfiguration;

impl Command for GetReplayConfiguration {
    const OPERATION: &'static str = "GetReplayConfiguration";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("trp:GetReplayConfiguration"))
    }
}

/// `SessionTimeout` is in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetReplayConfigurationParams {
    pub session_timeout: u64,
}

impl Command for SetReplayConfigurationParams {
    const OPERATION: &'static str = "SetReplayConfiguration";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("trp:SetReplayConfiguration").with_child(
            Element::new("trp:Configuration").with_child(leaf(
                "trp:SessionTimeout",
                xs_duration(self.session_timeout),
            )),
        ))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetServiceCapabilities;

impl Command for GetServiceCapabilities {
    const OPERATION: &'static str = "GetServiceCapabilities";

    fn build_body(&self) -> Result<Element, ValidationError> {
        Ok(Element::new("trp:GetServiceCapabilities"))
    }
}

pub struct ReplayService<T = ReqwestTransport> {
    client: ServiceClient<T>,
}

impl<T: HttpTransport> ReplayService<T> {
    pub fn new(endpoint: ServiceEndpoint, clock_offset: ClockOffset, transport: T) -> Self {
        Self {
            client: ServiceClient::new(&REPLAY_SERVICE, endpoint, clock_offset, transport),
        }
    }

    pub fn set_clock_offset(&mut self, offset: ClockOffset) {
        self.client.set_clock_offset(offset);
    }

    pub async fn get_replay_uri(
        &self,
        params: &GetReplayUriParams,
    ) -> Result<CommandResponse, CommandError> {
        self.client.call(params).await
    }

    pub async fn get_replay_configuration(&self) -> Result<CommandResponse, CommandError> {
        self.client.call(&GetReplayConfiguration).await
    }

    pub async fn set_replay_configuration(
        &self,
        params: &SetReplayConfigurationParams,
    ) -> Result<CommandResponse, CommandError> {
        self.client.call(params).await
    }

    pub async fn get_service_capabilities(&self) -> Result<CommandResponse, CommandError> {
        self.client.call(&GetServiceCapabilities).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayUri {
    pub uri: String,
}

impl ReplayUri {
    pub fn from_response(response: &CommandResponse) -> Result<Self, TransportError> {
        let uri = response.data().child_text("Uri").ok_or_else(|| {
            TransportError::MalformedReply(format!("{} reply has no Uri", response.operation()))
        })?;
        Ok(Self { uri })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfiguration {
    pub session_timeout: String,
}

impl ReplayConfiguration {
    pub fn from_response(response: &CommandResponse) -> Result<Self, TransportError> {
        let session_timeout = response
            .data()
            .find("Configuration")
            .and_then(|configuration| configuration.child_text("SessionTimeout"))
            .ok_or_else(|| {
                TransportError::MalformedReply(format!(
                    "{} reply has no Configuration/SessionTimeout",
                    response.operation()
                ))
            })?;
        Ok(Self { session_timeout })
    }
}
