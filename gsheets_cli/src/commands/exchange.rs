use owo_colors::OwoColorize;

use gsheets_core::{Authenticator, CredentialStore};

use crate::commands::Result;

pub async fn run(code: &str) -> Result<()> {
    let authenticator = Authenticator::new(CredentialStore::new_default());
    authenticator.exchange_code(code).await?;
    println!(
        "{} Token saved to {}",
        "✓".green().bold(),
        authenticator.store().token_path().display()
    );
    println!("Run {} to register the server with Claude.", "gsheets setup".bold());
    Ok(())
}
