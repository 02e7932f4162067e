use owo_colors::OwoColorize;

use gsheets_core::redirect::{DEFAULT_PORT, DEFAULT_TIMEOUT};
use gsheets_core::{Authenticator, CredentialStore, RedirectListener};

use crate::commands::{read_line, CommandError, Result};

pub async fn run(manual: bool) -> Result<()> {
    let store = CredentialStore::new_default();
    let secrets = store.load_secrets()?;
    let redirect_uri = secrets.redirect_uri().to_string();
    let auth_url = Authenticator::authorization_url(&secrets.client_id, &redirect_uri);
    let authenticator = Authenticator::new(store);

    println!();
    println!("{}", "Google Sheets authorization".bold().cyan());
    println!();
    println!("Visit this URL to authorize the app:");
    println!();
    println!("  {}", auth_url.underline());
    println!();

    let code = if manual {
        prompt_for_code()?
    } else {
        let port = redirect_port(&redirect_uri);
        let listener = RedirectListener::bind(port).await?;
        open_browser(&auth_url);
        println!(
            "Waiting for the redirect on {} ({} minute timeout)...",
            format!("http://localhost:{}", listener.port()).dimmed(),
            DEFAULT_TIMEOUT.as_secs() / 60
        );
        listener.accept_code(DEFAULT_TIMEOUT).await?
    };

    let token = authenticator.exchange_code(&code).await?;
    println!(
        "{} Token saved to {}",
        "✓".green().bold(),
        authenticator.store().token_path().display()
    );
    if token.refresh_token.is_none() {
        println!(
            "{} No refresh token was returned; you may need to re-authenticate when the access token expires.",
            "!".yellow().bold()
        );
    }

    super::setup::run()?;

    println!();
    println!("{}", "Authorization complete.".green().bold());
    Ok(())
}

fn prompt_for_code() -> Result<String> {
    println!("After authorizing, paste the full redirect URL or just the code below.");
    let input = read_line("Redirect URL or code: ")?;
    if input.is_empty() {
        return Err(CommandError::Aborted("No code provided".to_string()));
    }
    Ok(extract_code(&input))
}

/// Accepts either a bare code or a pasted redirect URL carrying `code=`.
fn extract_code(input: &str) -> String {
    if let Ok(parsed) = url::Url::parse(input) {
        if let Some((_, code)) = parsed.query_pairs().find(|(k, _)| k == "code") {
            return code.into_owned();
        }
    }
    input.to_string()
}

fn redirect_port(redirect_uri: &str) -> u16 {
    url::Url::parse(redirect_uri)
        .ok()
        .and_then(|u| u.port())
        .unwrap_or(DEFAULT_PORT)
}

/// Best-effort; the URL is already printed for manual use.
fn open_browser(url: &str) {
    let command = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };
    if let Err(e) = std::process::Command::new(command).arg(url).spawn() {
        tracing::debug!("could not open browser: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_pasted_redirect_url() {
        assert_eq!(
            extract_code("http://localhost:3000/?code=4%2Fabc&scope=drive"),
            "4/abc"
        );
        assert_eq!(extract_code("raw-code-value"), "raw-code-value");
        // A URL without a code parameter falls through unchanged
        assert_eq!(
            extract_code("http://localhost:3000/?error=denied"),
            "http://localhost:3000/?error=denied"
        );
    }

    #[test]
    fn redirect_port_prefers_the_registered_uri() {
        assert_eq!(redirect_port("http://localhost:8085"), 8085);
        assert_eq!(redirect_port("http://localhost"), DEFAULT_PORT);
        assert_eq!(redirect_port("not a url"), DEFAULT_PORT);
    }
}
