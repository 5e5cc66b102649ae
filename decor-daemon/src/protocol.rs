//! Newline-delimited JSON over the daemon's Unix socket.
//!
//! One request per line, one response line back:
//!
//! ```text
//! {"cmd":"decorations","source":"git"}
//! {"ok":true,"data":[{"source":"git","label":"Git","decoration_type":0,"decorations":[...]}]}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

pub const CMD_STATUS: &str = "status";
pub const CMD_DECORATIONS: &str = "decorations";
pub const CMD_STOP: &str = "stop";

/// Attempts made by [`request_status`] while the socket is coming up.
const STATUS_ATTEMPTS: usize = 5;
const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    /// Restricts `decorations` to one source id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl DaemonRequest {
    pub fn status() -> Self {
        Self::bare(CMD_STATUS)
    }

    pub fn stop() -> Self {
        Self::bare(CMD_STOP)
    }

    pub fn decorations(source: Option<String>) -> Self {
        Self {
            cmd: CMD_DECORATIONS.to_string(),
            source,
        }
    }

    fn bare(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// The payload of a successful response; a failed one becomes
    /// [`DaemonError::Protocol`] carrying the daemon's message verbatim.
    pub fn into_data(self) -> Result<Value, DaemonError> {
        if !self.ok {
            let message = self
                .error
                .unwrap_or_else(|| "daemon reported failure without a message".to_string());
            return Err(DaemonError::Protocol(message));
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

/// Write `request` to the daemon socket and read back one response line.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound
        | std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::ConnectionReset => DaemonError::DaemonNotRunning {
            socket: socket.clone(),
        },
        _ => io_err(&socket, err),
    })?;

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .and_then(|()| stream.flush())
        .map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(format!(
            "daemon hung up without answering '{}'",
            request.cmd
        )));
    }

    Ok(serde_json::from_str(reply.trim_end())?)
}

fn query(home: &Path, request: &DaemonRequest) -> Result<Value, DaemonError> {
    send_request(home, request)?.into_data()
}

/// Daemon status, retried briefly so a just-started daemon can bind first.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::status();
    let mut attempt = 1;
    loop {
        match query(home, &request) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_RETRY_DELAY);
            }
            result => return result,
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    query(home, &DaemonRequest::stop()).map(|_| ())
}

/// Decorations held by the daemon, for every source or only `source`.
pub fn request_decorations(home: &Path, source: Option<String>) -> Result<Value, DaemonError> {
    query(home, &DaemonRequest::decorations(source))
}
