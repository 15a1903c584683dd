use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use sgs_client::{AuthError, ClientConfig, ConfigError, FileStore, KeyValueStore, RealtimeHandle, SessionStore};
use tracing_subscriber::EnvFilter;

/// How long `listen` waits for the close handshake before printing status.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("auth client error: {0}")]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("emit failed: {0}")]
    Emit(#[from] sgs_client::ConnectionError),
    #[error("{0}")]
    Failed(String),
}

#[derive(Parser, Debug)]
#[command(name = "sgs-client", about = "SGS game client: auth session and realtime connection")]
struct Cli {
    /// Overrides `SGS_API_BASE`.
    #[arg(long)]
    api_base: Option<String>,

    /// Overrides `SGS_SOCKET_URL`.
    #[arg(long)]
    socket_url: Option<String>,

    /// Overrides `SGS_STORAGE_PATH`.
    #[arg(long)]
    storage: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the access token.
    Login { username: String, password: String },
    /// Create an account. Does not log in.
    Register {
        username: String,
        password: String,
        nickname: String,
    },
    /// Forget the persisted token.
    Logout,
    /// Print the session restored from storage.
    Whoami,
    /// Connect to the realtime endpoint and log inbound events.
    Listen(ListenArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Event to emit once started.
    #[arg(long)]
    emit: Option<String>,

    /// JSON argument for `--emit`.
    #[arg(long, requires = "emit")]
    data: Option<String>,

    /// Stop after this many seconds; runs until Ctrl-C when omitted.
    #[arg(long)]
    seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base.trim_end_matches('/').to_owned();
    }
    if let Some(socket_url) = cli.socket_url {
        config.realtime.url = socket_url;
    }
    if let Some(storage) = cli.storage {
        config.storage_path = storage.into();
    }

    match cli.command {
        Command::Login { username, password } => {
            let store = session_store(&config)?;
            let outcome = store.login(&username, &password).await;
            print_json(&outcome)?;
            finish(outcome.success, outcome.msg)
        }
        Command::Register {
            username,
            password,
            nickname,
        } => {
            let store = session_store(&config)?;
            let outcome = store.register(&username, &password, &nickname).await;
            print_json(&outcome)?;
            finish(outcome.success, outcome.msg)
        }
        Command::Logout => {
            session_store(&config)?.logout();
            println!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let store = session_store(&config)?;
            print_json(&store.session())?;
            Ok(())
        }
        Command::Listen(args) => run_listen(&config, args).await,
    }
}

fn session_store(config: &ClientConfig) -> Result<SessionStore, CliError> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.storage_path.clone()));
    Ok(SessionStore::from_config(config, storage)?)
}

async fn run_listen(config: &ClientConfig, args: ListenArgs) -> Result<(), CliError> {
    let payload = args.data.as_deref().map(serde_json::from_str::<Value>).transpose()?;

    let handle = RealtimeHandle::new(config.realtime.clone());
    handle.connect();
    if let Some(event) = args.emit.as_deref() {
        handle.emit(event, payload.into_iter().collect())?;
    }

    match args.seconds {
        Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
            }
        }
    }

    handle.disconnect();
    if !handle.wait_disconnected(CLOSE_TIMEOUT).await {
        tracing::warn!("realtime connection did not close in time");
    }
    print_json(&handle.status())
}

fn finish(success: bool, msg: Option<String>) -> Result<(), CliError> {
    if success {
        Ok(())
    } else {
        Err(CliError::Failed(msg.unwrap_or_default()))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
