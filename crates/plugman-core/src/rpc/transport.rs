//! Newline-delimited JSON transport over an owned duplex byte stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::error::{PluginError, Result};

pub struct Transport {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl Transport {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: BufReader::new(Box::new(reader)),
            writer: Box::new(writer),
        }
    }

    /// Send one message (a JSON object followed by a newline).
    pub async fn send(&mut self, message: &str) -> Result<()> {
        self.writer
            .write_all(message.as_bytes())
            .await
            .map_err(write_err)?;
        self.writer.write_all(b"\n").await.map_err(write_err)?;
        self.writer.flush().await.map_err(write_err)?;
        debug!("sent: {message}");
        Ok(())
    }

    /// Receive the next protocol message. Lines that are not JSON objects
    /// are the plugin's own output and are forwarded to our stdout.
    pub async fn receive(&mut self) -> Result<String> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|err| PluginError::Protocol(format!("channel read failed: {err}")))?;

            if read == 0 {
                return Err(PluginError::Protocol(
                    "plugin closed the channel".to_string(),
                ));
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('{') {
                debug!("received: {line}");
                return Ok(line.to_string());
            }

            forward_line(line);
        }
    }
}

fn write_err(err: std::io::Error) -> PluginError {
    PluginError::Protocol(format!("channel write failed: {err}"))
}

// Plugin output must not take the host down when our stdout is a closed
// pipe, so a failed write is dropped rather than panicking like println!.
fn forward_line(line: &str) {
    use std::io::Write as _;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let _ = stdout.write_all(line.as_bytes());
    let _ = stdout.write_all(b"\n");
}
