//! CLI command definitions and dispatch for the `swbd` binary.
//!
//! Uses clap derive macros for argument parsing. Resource commands follow a
//! noun-verb pattern (e.g., `swbd accounts list`).

pub mod accounts;
pub mod message;
pub mod status;
pub mod tools;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Relay WhatsApp webhooks for several business accounts.
#[derive(Parser)]
#[command(name = "swbd", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log as one JSON object per line.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans with the OpenTelemetry stdout exporter.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook relay server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Manage business accounts.
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Send a message through the provider and record it.
    Send {
        /// Recipient phone number (any format).
        to: String,

        /// Message text. Not needed with --template.
        message: Option<String>,

        /// Sending account (defaults to the default account).
        #[arg(short, long)]
        account: Option<String>,

        /// Send the configured template instead of text.
        #[arg(long)]
        template: bool,
    },

    /// Show the stored conversation with a phone number.
    History {
        /// Phone number (any format).
        phone: String,

        /// Account the conversation belongs to (defaults to the default account).
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Relay status: accounts, database, signature enforcement.
    Status,

    /// Print the canonical form of a phone number.
    Normalize {
        /// Phone number to normalize.
        phone: String,
    },

    /// Compute the X-Hub-Signature-256 header for a request body.
    Sign {
        /// Body to sign. Reads --file or stdin when omitted.
        body: Option<String>,

        /// Read the body from a file.
        #[arg(short, long, conflicts_with = "body")]
        file: Option<std::path::PathBuf>,

        /// App secret (defaults to the configured app_secret).
        #[arg(long, env = "SWITCHBOARD_APP_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommand {
    /// List accounts.
    #[command(alias = "ls")]
    List {
        /// Include inactive accounts.
        #[arg(short, long)]
        all: bool,
    },

    /// Register a new account.
    Add {
        /// Account id used in URLs and storage keys.
        id: String,

        /// Display name.
        #[arg(long)]
        name: String,

        /// Provider access token.
        #[arg(long, env = "SWITCHBOARD_ACCOUNT_TOKEN", hide_env_values = true)]
        token: String,

        /// Provider phone number id. Looked up from --business-id when omitted.
        #[arg(long, required_unless_present = "business_id")]
        phone_id: Option<String>,

        /// Provider business account id.
        #[arg(long, default_value = "")]
        business_id: String,

        /// Register the account as inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// Remove an account. The default account cannot be removed.
    #[command(alias = "rm")]
    Remove {
        /// Account id.
        id: String,
    },
}
