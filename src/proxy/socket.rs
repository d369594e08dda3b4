//! Admin socket command pass.
//!
//! One connection per tick: every command is written as a single line and
//! exactly one response frame is read back before the next command goes out.
//! The proxy acknowledges with a lone newline; any other frame (including a
//! short read, a long error message, or silence until the timeout) fails the
//! pass and the caller falls back to a full reload.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

/// Upper bound on each socket operation; the admin endpoint answers in
/// microseconds when healthy, so hitting this means the proxy is wedged.
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-read response buffer. A success frame is one byte; anything that
/// does not fit here is a failure anyway.
const MAX_RESPONSE: usize = 1024;

/// Error type for the socket pass.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("cannot open admin socket: {0}")]
    Connect(std::io::Error),

    #[error("cannot send command: {0}")]
    Write(std::io::Error),

    #[error("cannot read response: {0}")]
    Read(std::io::Error),

    #[error("admin socket operation timed out")]
    Timeout,

    #[error("unexpected response {0:?}")]
    Response(String),
}

/// Send the commands sequentially over the admin socket at `path`.
pub async fn send_commands(path: &str, commands: &[String]) -> Result<(), SocketError> {
    let mut stream = timeout(IO_TIMEOUT, UnixStream::connect(path))
        .await
        .map_err(|_| SocketError::Timeout)?
        .map_err(SocketError::Connect)?;

    let mut buf = [0u8; MAX_RESPONSE];
    for command in commands {
        let line = format!("{}\n", command);
        timeout(IO_TIMEOUT, stream.write_all(line.as_bytes()))
            .await
            .map_err(|_| SocketError::Timeout)?
            .map_err(SocketError::Write)?;

        let n = timeout(IO_TIMEOUT, stream.read(&mut buf))
            .await
            .map_err(|_| SocketError::Timeout)?
            .map_err(SocketError::Read)?;

        if &buf[..n] != b"\n" {
            return Err(SocketError::Response(
                String::from_utf8_lossy(&buf[..n]).into_owned(),
            ));
        }
        tracing::debug!(command = %command, "Admin socket command acknowledged");
    }

    Ok(())
}
