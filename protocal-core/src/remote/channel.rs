//! Bridge subprocess plumbing.
//!
//! The bridge executable holds the cryptographic and wire logic. It is
//! resolved from an explicit override, the `PROTOCAL_BRIDGE` variable,
//! or PATH, and then driven with one JSON request per line on stdin and
//! one JSON response per line on stdout for the lifetime of a session.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{CalError, CalResult};
use crate::remote::protocol::{Command, Request, Response};

/// Default bridge executable, looked up on PATH.
pub const BRIDGE_BINARY: &str = "protocal-bridge";

/// Environment override for the bridge executable path.
pub const ENV_BRIDGE: &str = "PROTOCAL_BRIDGE";

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication can wait on SRP rounds and a second factor, so it
/// gets a much longer leash than ordinary calls.
const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// One request/response exchange with the bridge process.
///
/// The session types only ever talk through this seam, which keeps the
/// pipeline testable without a bridge installed.
#[async_trait]
pub trait Channel: Send {
    /// Send one request and read back the raw response line.
    async fn exchange(&mut self, request: Request) -> CalResult<String>;

    /// End the bridge process and reap it. Idempotent.
    async fn shutdown(&mut self);
}

/// Decode a response line into the command's typed payload.
pub(crate) fn decode_response<R: DeserializeOwned>(line: &str) -> CalResult<R> {
    let response: Response<R> = serde_json::from_str(line)
        .map_err(|e| CalError::Bridge(format!("failed to parse response: {e}")))?;
    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(CalError::Bridge(error)),
    }
}

/// Where to find the bridge executable.
#[derive(Debug, Clone, Default)]
pub struct BridgeLocator {
    /// Explicit path or name; beats the environment and PATH.
    pub override_path: Option<PathBuf>,
}

impl BridgeLocator {
    /// Resolve the bridge executable without spawning it.
    pub fn resolve(&self) -> CalResult<PathBuf> {
        if let Some(path) = &self.override_path {
            return Ok(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_BRIDGE) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        which::which(BRIDGE_BINARY)
            .map_err(|_| CalError::BridgeNotInstalled(BRIDGE_BINARY.to_string()))
    }

    /// Spawn a bridge child for one session.
    pub fn spawn(&self) -> CalResult<BridgeChannel> {
        let path = self.resolve()?;
        debug!(bridge = %path.display(), "spawning bridge");

        let mut child = TokioCommand::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CalError::Bridge(format!("failed to spawn {}: {e}", path.display())))?;

        // Unwraps are safe: both ends were piped above.
        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap());

        Ok(BridgeChannel {
            child,
            stdin: Some(stdin),
            stdout,
            released: false,
        })
    }
}

/// Line-framed JSON channel to a spawned bridge process.
///
/// `kill_on_drop` on the child backstops any path that fails to call
/// [`Channel::shutdown`].
pub struct BridgeChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    released: bool,
}

impl BridgeChannel {
    async fn roundtrip(&mut self, line: String) -> CalResult<String> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CalError::Bridge("bridge stdin closed".into()))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        let mut response = String::new();
        loop {
            response.clear();
            let read = self.stdout.read_line(&mut response).await?;
            if read == 0 {
                return Err(CalError::Bridge("bridge closed the stream".into()));
            }
            if !response.trim().is_empty() {
                return Ok(response.trim_end().to_string());
            }
        }
    }
}

#[async_trait]
impl Channel for BridgeChannel {
    async fn exchange(&mut self, request: Request) -> CalResult<String> {
        if self.released {
            return Err(CalError::Bridge("bridge already released".into()));
        }

        // Interactive auth rounds may block on the service.
        let call_timeout = match request.command {
            Command::AuthInfo | Command::Authenticate => AUTH_TIMEOUT,
            _ => CALL_TIMEOUT,
        };

        trace!(command = ?request.command, "bridge request");
        let line = serde_json::to_string(&request)
            .map_err(|e| CalError::Serialization(e.to_string()))?;

        timeout(call_timeout, self.roundtrip(line))
            .await
            .map_err(|_| CalError::BridgeTimeout(call_timeout.as_secs()))?
    }

    async fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Closing stdin asks the bridge to exit; the kill is a backstop
        // for a bridge that does not.
        self.stdin.take();
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
        debug!("bridge released");
    }
}
