//! Command-line interface for reqdesk.

mod commands;

use clap::{Parser, Subcommand};

/// reqdesk - marketing request desk backend
#[derive(Parser)]
#[command(name = "reqdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API (default)
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Create an admin account if the email is not taken yet
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Load and validate the configuration, then exit
    #[command(alias = "check")]
    CheckConfig,
}

pub use commands::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["reqdesk"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_admin_args() {
        let cli = Cli::try_parse_from([
            "reqdesk",
            "create-admin",
            "--email",
            "root@example.com",
            "--password",
            "supersecret",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateAdmin { email, name, .. }) => {
                assert_eq!(email, "root@example.com");
                assert!(name.is_none());
            }
            _ => panic!("expected create-admin"),
        }
    }

    #[test]
    fn test_create_admin_requires_email() {
        assert!(Cli::try_parse_from(["reqdesk", "create-admin", "--password", "x"]).is_err());
    }
}
