pub mod authenticate;
pub mod cleanup;
pub mod exchange;
pub mod setup;
pub mod status;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Core(#[from] gsheets_core::SheetsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Path used as the `command` of the Claude settings entry: the
/// `gsheets_mcp` binary next to this one when it exists, otherwise the
/// bare name so PATH lookup applies.
pub fn server_command() -> String {
    let name = if cfg!(windows) {
        "gsheets_mcp.exe"
    } else {
        "gsheets_mcp"
    };
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join(name);
            if candidate.exists() {
                return candidate.display().to_string();
            }
        }
    }
    name.to_string()
}

/// Reads one line from stdin, trimmed.
pub fn read_line(prompt: &str) -> std::io::Result<String> {
    use std::io::Write;
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Yes/no prompt defaulting to no.
pub fn confirm(prompt: &str) -> std::io::Result<bool> {
    let answer = read_line(&format!("{} [y/N]: ", prompt))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}
