use crate::cli::Args;
use anyhow::{bail, Context, Result};
use onvif_command::{ClockOffset, Credentials, ReqwestTransport, ServiceEndpoint};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Target {
    xaddr: Url,
    credentials: Option<Credentials>,
    clock_offset: ClockOffset,
    timeout: Duration,
    insecure: bool,
}

impl Target {
    pub fn from_args(args: &Args) -> Result<Self> {
        let xaddr = args.xaddr.trim();
        if xaddr.is_empty() {
            bail!("xaddr is required");
        }
        let xaddr = Url::parse(xaddr).with_context(|| format!("invalid xaddr {}", xaddr))?;
        if !matches!(xaddr.scheme(), "http" | "https") {
            bail!("xaddr must be an http or https URL, got {}", xaddr.scheme());
        }
        let credentials = match (&args.username, &args.password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.as_str(), pass.as_str())),
            (None, None) => None,
            _ => bail!("username and password must be given together"),
        };
        if args.timeout_ms == 0 {
            bail!("timeout must be greater than zero");
        }
        Ok(Self {
            xaddr,
            credentials,
            clock_offset: ClockOffset::from_seconds(args.time_offset_secs),
            timeout: Duration::from_millis(args.timeout_ms),
            insecure: args.insecure,
        })
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(self.xaddr.as_str(), self.credentials.clone())
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.clock_offset
    }

    pub fn transport(&self) -> Result<ReqwestTransport> {
        ReqwestTransport::new(self.timeout, self.insecure).context("http client build failed")
    }
}
