mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::auth::AuthOptions;
use commands::enroll::EnrollOptions;

#[derive(Parser)]
#[command(name = "pentagon", about = "Passwordless challenge-response authentication")]
struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "PENTAGON_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an identity and register it with the verifier
    Enroll {
        /// Replace the identity already enrolled on this device
        #[arg(long)]
        replace: bool,

        /// Secret (prompted for when omitted)
        #[arg(long)]
        secret: Option<String>,

        /// Legend as direction codes in Red, Green, Blue, Yellow order (e.g. urdl)
        #[arg(long, conflicts_with = "keys")]
        legend: Option<String>,

        /// Legend as W/A/S/D keys in Red, Green, Blue, Yellow order (e.g. wdsa)
        #[arg(long)]
        keys: Option<String>,

        /// Print the generated private key once
        #[arg(long)]
        show_private_key: bool,

        /// Approve confirmations without prompting
        #[arg(short, long)]
        yes: bool,

        /// Verifier URL override (e.g. ws://127.0.0.1:8443)
        #[arg(long, env = "PENTAGON_VERIFIER")]
        verifier: Option<String>,
    },

    /// Prove the enrolled identity in one session
    Auth {
        /// Secret; with --legend, answers are derived without prompting
        #[arg(long, requires = "legend")]
        secret: Option<String>,

        /// Legend as direction codes (e.g. urdl)
        #[arg(long, requires = "secret")]
        legend: Option<String>,

        /// Approve the ceremony without prompting
        #[arg(short, long)]
        yes: bool,

        /// Verifier URL override (e.g. ws://127.0.0.1:8443)
        #[arg(long, env = "PENTAGON_VERIFIER")]
        verifier: Option<String>,
    },

    /// Show configuration and the enrolled identity
    Status,

    /// Forget the credential stored on this device
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a config value
    Set { key: String, value: String },
    /// Get a config value
    Get { key: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let result = match cli.command {
        Commands::Enroll {
            replace,
            secret,
            legend,
            keys,
            show_private_key,
            yes,
            verifier,
        } => {
            commands::enroll::run(EnrollOptions {
                replace,
                secret,
                legend,
                keys,
                show_private_key,
                yes,
                verifier,
            })
            .await
        }
        Commands::Auth {
            secret,
            legend,
            yes,
            verifier,
        } => {
            commands::auth::run(AuthOptions {
                secret,
                legend,
                yes,
                verifier,
            })
            .await
        }
        Commands::Status => commands::status::run(),
        Commands::Reset { yes } => commands::reset::run(yes),
        Commands::Config { action } => match action {
            ConfigAction::Set { key, value } => commands::config::set(&key, &value),
            ConfigAction::Get { key } => commands::config::get(&key),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
