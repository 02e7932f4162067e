use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gsheets")]
#[command(about = "Operator CLI for the Google Sheets MCP server")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  gsheets authenticate          Run the interactive OAuth flow
  gsheets setup                 Register the server in Claude settings
  gsheets status                Show which local auth files exist

\x1b[1;36mRecovery:\x1b[0m
  gsheets exchange <code>       Exchange a pasted authorization code
  gsheets cleanup               Remove stored credentials and settings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authorize with Google and save a token
    ///
    /// Opens the consent screen in a browser and captures the redirect on a
    /// local port. On success the token is saved and the Claude settings
    /// entry is installed.
    #[command(alias = "auth")]
    Authenticate {
        /// Paste the redirect URL or code instead of running a local listener
        #[arg(long)]
        manual: bool,
    },

    /// Exchange an authorization code for a token directly
    ///
    /// Useful when the browser flow finished but the local capture failed;
    /// paste the `code` parameter from the redirect URL.
    Exchange {
        /// Authorization code from the OAuth redirect
        code: String,
    },

    /// Register the MCP server in Claude settings
    Setup,

    /// Remove stored credentials, token, and the settings entry
    Cleanup {
        /// Skip confirmation prompts
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show which local auth artifacts exist
    Status,
}
