use owo_colors::OwoColorize;

use gsheets_core::{ClaudeSettings, CredentialStore};

use crate::commands::{confirm, Result};

pub fn run(yes: bool) -> Result<()> {
    let store = CredentialStore::new_default();
    let settings = ClaudeSettings::new_default();
    let mut removed = 0usize;

    println!();
    println!("{}", "Google Sheets MCP cleanup".bold().cyan());
    println!();

    for path in [store.credentials_path(), store.token_path()] {
        if !path.exists() {
            continue;
        }
        if yes || confirm(&format!("Remove {}?", path.display()))? {
            if CredentialStore::remove_file(&path)? {
                println!("{} Removed {}", "✓".green().bold(), path.display());
                removed += 1;
            }
        }
    }

    if settings.server_entry().is_some()
        && (yes || confirm("Remove the 'google-sheets' entry from Claude settings?")?)
        && settings.remove_server()?
    {
        println!(
            "{} Removed settings entry from {}",
            "✓".green().bold(),
            settings.path().display()
        );
        removed += 1;
    }

    println!();
    if removed == 0 {
        println!("Nothing to clean up.");
    } else {
        println!("Removed {} item(s).", removed);
    }
    Ok(())
}
