use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "covera", about = "Covera policy service client", version)]
pub struct Cli {
    /// Backend base URL.
    #[arg(long, global = true, env = "COVERA_API_URL")]
    pub api_url: Option<String>,

    /// Credential document location.
    #[arg(long, global = true, env = "COVERA_CREDENTIALS_PATH")]
    pub credentials: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COVERA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "COVERA_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },

    /// Forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Show packages and standalone policies.
    Dashboard {
        /// Print the portfolio as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Pay a package.
    Pay { package_id: String },

    /// Cancel a package.
    Cancel { package_id: String },

    /// Print version.
    Version,
}
