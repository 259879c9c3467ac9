// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use covera_core::models::auth::RegisterRequest;
use covera_core::{ClientConfig, CoveraClient};
use tracing::{error, info};

mod cli;
mod render;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,covera_core=debug")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{}", e);
        if e.needs_login() {
            eprintln!("Session expired or missing. Run `covera login`.");
        } else if e.is_transient() {
            eprintln!("The service could not be reached. Please try again.");
        }
        std::process::exit(1);
    }
}

fn config(args: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(path) = &args.credentials {
        config.credentials_path = Some(path.clone());
    }
    config
}

fn print_version() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

async fn run(args: Cli) -> Result<()> {
    let config = config(&args);
    match args.command {
        // No client needed, so no store is opened.
        Commands::Version => print_version(),
        command => execute(&CoveraClient::new(config)?, command).await?,
    }
    Ok(())
}

async fn execute(client: &CoveraClient, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let credential = client.login(&email, &password).await?;
            println!("Signed in as {}", credential.profile.display_name());
        }
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let request = RegisterRequest {
                email,
                password,
                first_name,
                last_name,
            };
            let credential = client.register(&request).await?;
            println!("Registered {}", credential.profile.display_name());
        }
        Commands::Logout => {
            client.logout()?;
            println!("Signed out");
        }
        Commands::Whoami => {
            let credential = client.current().ok_or(Error::NotSignedIn)?;
            let profile = &credential.profile;
            println!("{} <{}>", profile.display_name(), profile.email);
            if !profile.role.is_empty() {
                println!("role: {}", profile.role);
            }
            if !profile.level.is_empty() {
                println!("level: {}", profile.level);
            }
            println!("policies: {}", profile.policy_count);
        }
        Commands::Dashboard { json } => {
            require_session(client)?;
            let portfolio = client.dashboard().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&portfolio)?);
            } else {
                print!("{}", render::portfolio(&portfolio));
            }
        }
        Commands::Pay { package_id } => {
            require_session(client)?;
            let portfolio = client.pay_package(&package_id).await?;
            info!(package = %package_id, "payment submitted");
            print!("{}", render::portfolio(&portfolio));
        }
        Commands::Cancel { package_id } => {
            require_session(client)?;
            let portfolio = client.cancel_package(&package_id).await?;
            info!(package = %package_id, "cancellation submitted");
            print!("{}", render::portfolio(&portfolio));
        }
        Commands::Version => print_version(),
    }

    Ok(())
}

fn require_session(client: &CoveraClient) -> Result<()> {
    if client.current().is_none() {
        return Err(Error::NotSignedIn);
    }
    Ok(())
}
