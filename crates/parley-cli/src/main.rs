//! Parley line client entry point.

use clap::Parser;
use parley_cli::{CliError, Runtime, TerminalDriver};
use parley_client::{
    ClientConfig,
    api::{API_URL_VAR, ApiClient, ApiConfig, Deployment},
};
use parley_core::{SystemEnv, channel::DEFAULT_ENDPOINT};
use tracing_subscriber::EnvFilter;

/// Parley terminal client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Line-oriented client for the Parley chat service")]
#[command(version)]
struct Args {
    /// REST API base URL. Defaults by deployment when omitted.
    #[arg(long, env = API_URL_VAR)]
    api_url: Option<String>,

    /// Realtime WebSocket endpoint.
    #[arg(long, env = "PARLEY_WS_URL", default_value = DEFAULT_ENDPOINT)]
    ws_url: String,

    /// Use the production API (`PARLEY_PRODUCTION_API_URL`).
    #[arg(long)]
    production: bool,

    /// Account to log in as.
    #[arg(short, long, env = "PARLEY_USERNAME")]
    username: String,

    /// Password for the account.
    #[arg(short, long, env = "PARLEY_PASSWORD", hide_env_values = true)]
    password: String,

    /// Do not open the realtime channel; messages still send over REST.
    #[arg(long)]
    no_realtime: bool,
}

impl Args {
    fn api_config(&self) -> Result<ApiConfig, CliError> {
        if let Some(url) = &self.api_url
            && !self.production
        {
            return Ok(ApiConfig::new(url.as_str()));
        }
        let deployment =
            if self.production { Deployment::Production } else { Deployment::Development };
        Ok(ApiConfig::from_environment(deployment)?)
    }
}

fn init_logging() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    init_logging()?;

    let mut api = ApiClient::new(args.api_config()?)?;
    let login = api.login(&args.username, &args.password).await?;
    tracing::info!(user = %login.user.username, api = %api.config().base_url, "logged in");

    let mut config = ClientConfig::default();
    config.channel.endpoint = args.ws_url;

    let driver = TerminalDriver::new(api);
    let runtime = Runtime::new(driver, SystemEnv::new(), login.user, config, !args.no_realtime);
    Ok(runtime.run().await?)
}
