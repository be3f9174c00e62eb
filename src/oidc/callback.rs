//! Local HTTP listener receiving the authorization redirect.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

use crate::error::TokenError;

const SUCCESS_PAGE: &str =
    "<html><body><h1>Login complete</h1><p>You may close this window.</p></body></html>";

/// Result of inspecting one request to the listener
#[derive(Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Request for some other path, e.g. the browser asking for a favicon
    NotCallback,
    Code(String),
    Failed(String),
}

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind to `127.0.0.1:port`; port 0 picks a free port.
    pub async fn bind(port: u16, path: &str) -> Result<Self, TokenError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| {
                TokenError::Callback(format!("cannot listen on port {}: {}", port, e))
            })?;
        Ok(Self {
            listener,
            path: path.to_string(),
        })
    }

    pub fn port(&self) -> Result<u16, TokenError> {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|e| TokenError::Callback(e.to_string()))
    }

    /// Serve requests until the redirect carrying `expected_state` arrives.
    pub async fn wait_for_code(&self, expected_state: &str) -> Result<String, TokenError> {
        loop {
            let (mut stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| TokenError::Callback(e.to_string()))?;

            let target = match read_request_target(&mut stream).await {
                Ok(target) => target,
                Err(e) => {
                    tracing::debug!("Ignoring malformed request from {}: {}", peer, e);
                    continue;
                }
            };

            match parse_callback(&target, &self.path, expected_state) {
                CallbackOutcome::NotCallback => {
                    respond(&mut stream, "404 Not Found", "Not found").await;
                }
                CallbackOutcome::Code(code) => {
                    respond(&mut stream, "200 OK", SUCCESS_PAGE).await;
                    return Ok(code);
                }
                CallbackOutcome::Failed(reason) => {
                    respond(&mut stream, "400 Bad Request", &reason).await;
                    return Err(TokenError::Callback(reason));
                }
            }
        }
    }
}

/// Interpret a request target such as `/auth/callback?code=..&state=..`.
pub fn parse_callback(target: &str, path: &str, expected_state: &str) -> CallbackOutcome {
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return CallbackOutcome::NotCallback;
    };
    if url.path() != path {
        return CallbackOutcome::NotCallback;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return CallbackOutcome::Failed(match error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        });
    }
    if state.as_deref() != Some(expected_state) {
        return CallbackOutcome::Failed("state parameter mismatch".to_string());
    }
    match code {
        Some(code) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => CallbackOutcome::Failed("authorization code missing".to_string()),
    }
}

/// Read the request line and headers; return the request target.
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(target.to_string()),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected request line {:?}", request_line.trim_end()),
        )),
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to answer callback request: {}", e);
    }
    let _ = stream.shutdown().await;
}
