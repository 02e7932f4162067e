use owo_colors::OwoColorize;

use gsheets_core::{ClaudeSettings, CredentialStore};

use crate::commands::Result;

pub fn run() -> Result<()> {
    let store = CredentialStore::new_default();
    let settings = ClaudeSettings::new_default();

    println!();
    println!("{}", "Google Sheets MCP status".bold().cyan());
    println!();
    report("Credentials file", store.credentials_path().exists(), &store.credentials_path().display().to_string());
    report("Token file", store.token_path().exists(), &store.token_path().display().to_string());
    report(
        "Claude settings entry",
        settings.server_entry().is_some(),
        &settings.path().display().to_string(),
    );
    println!();
    Ok(())
}

fn report(label: &str, present: bool, path: &str) {
    if present {
        println!("  {} {:<22} {}", "✓".green().bold(), label, path.dimmed());
    } else {
        println!("  {} {:<22} {}", "✗".red().bold(), label, path.dimmed());
    }
}
