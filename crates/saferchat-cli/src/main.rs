//! saferchat terminal client.

use std::time::Duration;

use clap::Parser;
use saferchat_app::Runtime;
use saferchat_cli::TerminalDriver;
use saferchat_client::{JoinRequest, Session, SessionConfig, WsTransport};
use saferchat_core::{Link, SystemEnv};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "saferchat")]
#[command(about = "End-to-end encrypted channel chat")]
struct Args {
    /// Relay URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Seconds between keepalive frames while in a channel
    #[arg(long, default_value_t = 60)]
    keepalive_secs: u64,

    /// Milliseconds to wait before reconnecting after a drop
    #[arg(long, default_value_t = 1000)]
    reconnect_ms: u64,

    /// Seconds a connection attempt may take before it is abandoned
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Channel to join on startup
    #[arg(long, requires = "nickname")]
    channel: Option<String>,

    /// Nickname for the startup join
    #[arg(long, requires = "channel")]
    nickname: Option<String>,

    /// Channel secret for the startup join
    #[arg(long, env = "SAFERCHAT_SECRET", hide_env_values = true)]
    secret: Option<String>,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    fn startup_join(&self) -> Option<JoinRequest> {
        match (&self.channel, &self.nickname, &self.secret) {
            (Some(channel), Some(nickname), Some(secret)) => {
                Some(JoinRequest::new(nickname.as_str(), channel.as_str(), secret.as_str()))
            },
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "saferchat exited");
            std::process::ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::new(SystemEnv, args.session_config())?;
    info!(server = %args.server, fingerprint = %session.fingerprint(), "starting");

    let mut driver =
        TerminalDriver::new(BufReader::new(tokio::io::stdin()), std::io::stdout(), session.fingerprint());
    if let Some(request) = args.startup_join() {
        driver = driver.with_join(request);
    } else if args.channel.is_some() {
        info!("no secret given; use /join to enter the channel");
    }

    let link = Link::new(WsTransport::new(), args.server);
    Runtime::new(session, link, driver).run().await?;
    Ok(())
}
