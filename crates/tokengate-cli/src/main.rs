//! tokengate - keeps a bearer session for the plan service API.
//!
//! The binary stands in for the application front end: it stores a
//! credential obtained elsewhere, issues authenticated requests, and reacts
//! to the navigation requests the session core emits when a session ends.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tokengate_core::auth::{ChannelNavigator, Navigation};
use tokengate_core::config::StorageKind;
use tokengate_core::{ApiClient, Config, Credential, SessionManager, SessionState};

/// Log file name prefix in the data directory
const LOG_FILE_PREFIX: &str = "tokengate.log";

#[derive(Parser)]
#[command(name = "tokengate", version, about = "Bearer session client for the plan service API")]
struct Cli {
    /// API base URL (overrides config and TOKENGATE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Also write logs to a daily rolling file in the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a credential obtained from the token endpoint
    Login {
        /// Access token; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Show whether a session is active
    Status,
    /// Save settings to the config file (with --api-url, the URL too)
    Configure {
        /// Where the credential is kept: keyring, file or memory
        #[arg(long)]
        storage: Option<StorageKind>,

        /// Route to return to when a session ends
        #[arg(long)]
        entry_route: Option<String>,
    },
    /// Authenticated GET against a path below the API base URL
    Get {
        /// Path such as `plaene/` or `landwirte/3/`
        path: String,
    },
}

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    let log_dir = if cli.log_file {
        Some(config.data_dir()?)
    } else {
        None
    };
    let _log_guard = init_tracing(log_dir);
    info!(storage = %config.storage, api = %config.api_base_url, "tokengate starting");

    let (navigator, mut navigation) = ChannelNavigator::new();
    let session = SessionManager::start(config.credential_store()?, navigator)
        .with_entry_route(config.entry_route.clone());

    match cli.command {
        Command::Login { token } => {
            let token = match token {
                Some(token) => token,
                None => rpassword::prompt_password("Access token: ")?,
            };
            session.establish(&Credential::from(token.trim()))?;
            println!("Logged in.");
        }
        Command::Logout => {
            session.logout();
            drain(&mut navigation);
            println!("Logged out.");
        }
        Command::Status => print_status(&session),
        Command::Configure {
            storage,
            entry_route,
        } => {
            if let Some(storage) = storage {
                config.storage = storage;
            }
            if let Some(route) = entry_route {
                config.entry_route = route;
            }
            config.save()?;
            println!("Saved {}", Config::config_path()?.display());
        }
        Command::Get { path } => {
            let was_authenticated = session.is_authenticated();
            let signal = session.signal().subscribe();
            let client = ApiClient::from_config(&config, &session)?;

            match client.get_text(&path).await {
                Ok(body) => println!("{}", body),
                Err(e) => {
                    if session_ended(was_authenticated, *signal.borrow()) {
                        for nav in drain(&mut navigation) {
                            eprintln!("Session ended by the server, returning to {}", nav.route);
                        }
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

fn print_status(session: &SessionManager) {
    match session.state() {
        SessionState::Authenticated => {
            match session.store().stored_at() {
                Some(at) => println!("authenticated (credential stored {})", at.to_rfc3339()),
                None => println!("authenticated"),
            }
        }
        SessionState::Anonymous => println!("anonymous"),
    }
}

/// Only a session that was active before the request can be ended by it
fn session_ended(was_authenticated: bool, authenticated_now: bool) -> bool {
    was_authenticated && !authenticated_now
}

/// Collect navigation requests emitted so far
fn drain(navigation: &mut UnboundedReceiver<Navigation>) -> Vec<Navigation> {
    let mut requests = Vec::new();
    while let Ok(nav) = navigation.try_recv() {
        requests.push(nav);
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tokengate_core::CredentialStore;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_get() {
        let cli = Cli::try_parse_from(["tokengate", "get", "plaene/", "--api-url", "http://x/api"]).unwrap();
        assert_eq!(cli.api_url.as_deref(), Some("http://x/api"));
        assert!(matches!(cli.command, Command::Get { ref path } if path == "plaene/"));
    }

    #[test]
    fn test_parse_login_with_token() {
        let cli = Cli::try_parse_from(["tokengate", "login", "--token", "abc123"]).unwrap();
        assert!(matches!(cli.command, Command::Login { token: Some(ref t) } if t == "abc123"));
    }

    #[test]
    fn test_parse_configure() {
        let cli = Cli::try_parse_from(["tokengate", "configure", "--storage", "keyring"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Configure {
                storage: Some(StorageKind::Keyring),
                entry_route: None
            }
        ));
        assert!(Cli::try_parse_from(["tokengate", "configure", "--storage", "floppy"]).is_err());
    }

    #[test]
    fn test_session_ended_only_when_previously_authenticated() {
        assert!(session_ended(true, false));
        assert!(!session_ended(false, false));
        assert!(!session_ended(true, true));
    }

    #[tokio::test]
    async fn test_logout_emits_entry_route() {
        let (navigator, mut navigation) = ChannelNavigator::new();
        let store = CredentialStore::in_memory();
        store.set(&Credential::from("abc123")).unwrap();
        let session = SessionManager::start(store, navigator);

        session.logout();
        let routes: Vec<String> = drain(&mut navigation).into_iter().map(|n| n.route).collect();
        assert_eq!(routes, vec!["/"]);
        assert!(drain(&mut navigation).is_empty());
    }
}
