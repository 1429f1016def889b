use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send ONVIF search and replay commands to a device")]
pub struct Args {
    /// Service address (XAddr) of the search or replay service
    #[arg(long)]
    pub xaddr: String,

    /// Username for WS-Security authentication
    #[arg(long)]
    pub username: Option<String>,

    /// Password for WS-Security authentication
    #[arg(long)]
    pub password: Option<String>,

    /// Device clock minus local clock, in seconds
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub time_offset_secs: i64,

    /// Timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub timeout_ms: u64,

    /// Allow invalid TLS certificates for HTTPS services
    #[arg(long)]
    pub insecure: bool,

    /// Print the raw SOAP reply instead of JSON
    #[arg(long)]
    pub raw: bool,

    #[command(subcommand)]
    pub operation: Operation,
}

/// Parameter trees are given as JSON with the protocol's field names,
/// e.g. `{"Scope":{"IncludedSources":[{"Token":"src1"}]},"KeepAliveTime":60}`.
#[derive(Subcommand, Debug)]
pub enum Operation {
    /// Search service: start a recording search
    FindRecordings {
        #[arg(long)]
        params: String,
    },
    /// Search service: summary of all recordings
    GetRecordingSummary,
    /// Search service: fetch results of a running search
    GetRecordingSearchResults {
        #[arg(long)]
        params: String,
    },
    /// Search service: release a search session
    EndSearch {
        #[arg(long)]
        search_token: String,
    },
    /// Search service: capabilities
    SearchCapabilities,
    /// Replay service: RTSP URI of a recording
    GetReplayUri {
        #[arg(long)]
        params: String,
    },
    /// Replay service: current session timeout
    GetReplayConfiguration,
    /// Replay service: set the session timeout in seconds
    SetReplayConfiguration {
        #[arg(long)]
        session_timeout: u64,
    },
    /// Replay service: capabilities
    ReplayCapabilities,
}
