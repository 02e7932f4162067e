use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::error::SheetsError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body style=\"font-family: sans-serif; text-align: center; padding-top: 4em;\">\
<h1>Authorization successful</h1>\
<p>You can close this window and return to the terminal.</p>\
</body></html>";

/// One-shot loopback listener that captures the OAuth authorization code
/// from Google's redirect. The socket is held only for the lifetime of a
/// single capture; dropping the listener releases the port.
#[derive(Debug)]
pub struct RedirectListener {
    listener: TcpListener,
    port: u16,
}

impl RedirectListener {
    pub async fn bind(port: u16) -> Result<Self, SheetsError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => SheetsError::PortInUse(port),
                std::io::ErrorKind::PermissionDenied => SheetsError::PortPermissionDenied(port),
                _ => SheetsError::Io(e),
            })?;
        let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serves connections until one carries an authorization code, then
    /// returns it. Requests without a code get a 400 and the wait continues.
    /// Consumes the listener so the port is released on every exit path.
    pub async fn accept_code(self, timeout: Duration) -> Result<String, SheetsError> {
        match tokio::time::timeout(timeout, self.accept_loop()).await {
            Ok(result) => result,
            Err(_) => Err(SheetsError::AuthorizationTimeout(timeout.as_secs())),
        }
    }

    async fn accept_loop(&self) -> Result<String, SheetsError> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!("accept failed: {}", e);
                    continue;
                }
            };
            debug!("redirect connection from {}", addr);
            // Connection-level faults (preconnects, scanners, resets) must
            // not end the wait; only a code, a denial, or the timeout does.
            match Self::handle_connection(stream).await {
                Ok(Some(code)) => return Ok(code),
                Ok(None) => continue,
                Err(err @ SheetsError::Authentication(_)) => return Err(err),
                Err(err) => {
                    debug!("redirect connection error: {}", err);
                    continue;
                }
            }
        }
    }

    async fn handle_connection(stream: TcpStream) -> Result<Option<String>, SheetsError> {
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        let mut stream = reader.into_inner();
        match Self::parse_request_line(&request_line) {
            Ok(Some(code)) => {
                Self::respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
                Ok(Some(code))
            }
            Ok(None) => {
                Self::respond(&mut stream, "400 Bad Request", "Missing authorization code").await?;
                Ok(None)
            }
            Err(err) => {
                // Best-effort answer; the denial is reported either way
                if let Err(e) =
                    Self::respond(&mut stream, "400 Bad Request", "Authorization was denied").await
                {
                    debug!("failed to answer denied redirect: {}", e);
                }
                Err(err)
            }
        }
    }

    /// Pulls `code` (or a provider `error`) out of the request line's query.
    fn parse_request_line(line: &str) -> Result<Option<String>, SheetsError> {
        let path = match line.split_whitespace().nth(1) {
            Some(path) => path,
            None => return Ok(None),
        };
        let parsed = match url::Url::parse(&format!("http://localhost{}", path)) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(None),
        };

        let mut code = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => {
                    return Err(SheetsError::Authentication(format!(
                        "authorization denied: {}",
                        value
                    )))
                }
                _ => {}
            }
        }
        Ok(code.filter(|c| !c.is_empty()))
    }

    async fn respond(
        stream: &mut TcpStream,
        status: &str,
        body: &str,
    ) -> Result<(), SheetsError> {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}
