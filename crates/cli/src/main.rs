//! PropDesk CLI - session and role resolution from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in through the user form
//! propdesk login -e tenant@example.com -p 'correct-horse'
//!
//! # Sign in through the admin form
//! propdesk login --admin -e ops@propdesk.app -p 'correct-horse'
//!
//! # Create an account
//! propdesk signup -e tenant@example.com -p 'correct-horse'
//!
//! # Move to a page and apply the route guard
//! propdesk visit /admin/users
//!
//! # Development bypass (development/local only)
//! propdesk bypass enable --role admin
//! ```
//!
//! # Commands
//!
//! - `login` / `signup` / `logout` - Session transitions
//! - `status` - Current session, role, route and bypass state
//! - `visit` - Navigate and apply the route guard
//! - `bypass` - Manage the development bypass flag
//! - `profile` - Load the signed-in principal's profile

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propdesk_auth::AuthConfig;
use propdesk_core::Role;

mod app;
mod commands;
mod error;
mod navigator;

use error::CliError;

#[derive(Parser)]
#[command(name = "propdesk")]
#[command(author, version, about = "PropDesk session and role tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long, env = "PROPDESK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Use the admin login form
        #[arg(long)]
        admin: bool,
    },
    /// Create a user account
    Signup {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Account password (at least 8 characters)
        #[arg(short, long, env = "PROPDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the current session
    Status,
    /// Navigate to a page and apply the route guard
    Visit {
        /// Location such as `/dashboard/properties?tab=rent`
        path: String,
    },
    /// Manage the development bypass
    Bypass {
        #[command(subcommand)]
        action: BypassAction,
    },
    /// Load the signed-in principal's profile
    Profile,
}

#[derive(Subcommand)]
enum BypassAction {
    /// Simulate a signed-in principal at the route guard
    Enable {
        /// Role to simulate (`user` or `admin`)
        #[arg(short, long, default_value = "user")]
        role: Role,
    },
    /// Remove the bypass flag
    Disable,
    /// Show the stored flag and whether it is honored
    Show,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AuthConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.to_string().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "propdesk=info,propdesk_auth=info,propdesk_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = AuthConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AuthConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Login {
            email,
            password,
            admin,
        } => commands::session::login(config, &email, &password, admin).await,
        Commands::Signup { email, password } => {
            commands::session::signup(config, &email, &password).await
        }
        Commands::Logout => commands::session::logout(config).await,
        Commands::Status => commands::session::status(config).await,
        Commands::Visit { path } => commands::visit::visit(config, &path).await,
        Commands::Bypass { action } => match action {
            BypassAction::Enable { role } => commands::bypass::enable(&config, role),
            BypassAction::Disable => commands::bypass::disable(&config),
            BypassAction::Show => commands::bypass::show(&config),
        },
        Commands::Profile => commands::profile::show(config).await,
    }
}
