use owo_colors::OwoColorize;

use gsheets_core::ClaudeSettings;

use crate::commands::{server_command, Result};

pub fn run() -> Result<()> {
    let settings = ClaudeSettings::new_default();
    let command = server_command();
    if settings.install_server(&command, &[])? {
        println!(
            "{} Registered '{}' in {}",
            "✓".green().bold(),
            command,
            settings.path().display()
        );
    } else {
        println!(
            "{} Claude settings already up to date ({})",
            "✓".green().bold(),
            settings.path().display()
        );
    }
    Ok(())
}
