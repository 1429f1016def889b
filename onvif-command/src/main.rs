mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Operation;
use onvif_command::replay::{
    GetReplayUriParams, ReplayUri, SetReplayConfigurationParams,
};
use onvif_command::search::{
    EndSearchParams, FindRecordingsParams, FindRecordingsResult, GetRecordingSearchResultsParams,
};
use onvif_command::{CommandResponse, ReplayService, SearchService, ValidationError};
use serde::de::DeserializeOwned;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = cli::Args::parse();
    let target = config::Target::from_args(&args)?;
    let response = run(&target, &args.operation).await?;
    if args.raw {
        println!("{}", response.raw());
    } else {
        let json = serde_json::to_string_pretty(&response.to_json())
            .context("failed to render reply as JSON")?;
        println!("{}", json);
    }
    Ok(())
}

async fn run(target: &config::Target, operation: &Operation) -> Result<CommandResponse> {
    let endpoint = target.endpoint();
    let offset = target.clock_offset();
    let transport = target.transport()?;
    let response = match operation {
        Operation::FindRecordings { params } => {
            let params: FindRecordingsParams = parse_params(params)?;
            let response = SearchService::new(endpoint, offset, transport)
                .find_recordings(&params)
                .await
                .context("FindRecordings failed")?;
            if let Ok(result) = FindRecordingsResult::from_response(&response) {
                tracing::info!(search_token = %result.search_token, "search started");
            }
            response
        }
        Operation::GetRecordingSummary => SearchService::new(endpoint, offset, transport)
            .get_recording_summary()
            .await
            .context("GetRecordingSummary failed")?,
        Operation::GetRecordingSearchResults { params } => {
            let params: GetRecordingSearchResultsParams = parse_params(params)?;
            SearchService::new(endpoint, offset, transport)
                .get_recording_search_results(&params)
                .await
                .context("GetRecordingSearchResults failed")?
        }
        Operation::EndSearch { search_token } => {
            let params = EndSearchParams {
                search_token: search_token.clone(),
            };
            SearchService::new(endpoint, offset, transport)
                .end_search(&params)
                .await
                .context("EndSearch failed")?
        }
        Operation::SearchCapabilities => SearchService::new(endpoint, offset, transport)
            .get_service_capabilities()
            .await
            .context("GetServiceCapabilities failed")?,
        Operation::GetReplayUri { params } => {
            let params: GetReplayUriParams = parse_params(params)?;
            let response = ReplayService::new(endpoint, offset, transport)
                .get_replay_uri(&params)
                .await
                .context("GetReplayUri failed")?;
            if let Ok(replay) = ReplayUri::from_response(&response) {
                tracing::info!(uri = %replay.uri, "replay uri");
            }
            response
        }
        Operation::GetReplayConfiguration => ReplayService::new(endpoint, offset, transport)
            .get_replay_configuration()
            .await
            .context("GetReplayConfiguration failed")?,
        Operation::SetReplayConfiguration { session_timeout } => {
            let params = SetReplayConfigurationParams {
                session_timeout: *session_timeout,
            };
            ReplayService::new(endpoint, offset, transport)
                .set_replay_configuration(&params)
                .await
                .context("SetReplayConfiguration failed")?
        }
        Operation::ReplayCapabilities => ReplayService::new(endpoint, offset, transport)
            .get_service_capabilities()
            .await
            .context("GetServiceCapabilities failed")?,
    };
    Ok(response)
}

fn parse_params<P: DeserializeOwned>(json: &str) -> Result<P> {
    serde_json::from_str(json)
        .map_err(ValidationError::from)
        .context("invalid --params")
}

fn init_logging() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}
