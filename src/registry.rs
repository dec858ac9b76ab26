use std::io;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

/// How long one attempt waits for the registry's acknowledgment
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// The identity this instance advertises to the service registry.
/// Built once at startup and re-sent verbatim on every attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Registration loop. Dials the registry, sends the identity as one
/// JSON text line, and waits for an acknowledgment line; any failure
/// (dial, send, malformed or missing ack) closes the connection and
/// schedules a retry after `retry_interval`. Attempts are strictly
/// sequential. The loop exits on the first well-formed ack, or when
/// `shutdown` fires — the only cancellation signal, which also
/// abandons an in-flight attempt or wait.
///
/// Runs as its own task; nothing on the request-serving path ever
/// waits on it.
pub async fn run(
    registration: Registration,
    endpoint: String,
    retry_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let payload = match serde_json::to_string(&registration) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "cannot encode registration record, not registering");
            return;
        }
    };

    loop {
        tokio::select! {
            result = attempt(&endpoint, &payload) => match result {
                Ok(ack) => {
                    info!(
                        registry = %endpoint,
                        ack = %ack.trim(),
                        "registered with service registry"
                    );
                    return;
                }
                Err(err) => {
                    warn!(registry = %endpoint, %err, "registration attempt failed, retrying");
                }
            },
            _ = shutdown.changed() => {
                info!("shutting down, abandoning registration attempt");
                return;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(retry_interval) => {}
            _ = shutdown.changed() => {
                info!("shutting down, abandoning registration retries");
                return;
            }
        }
    }
}

/// One registration attempt: dial, send the record, await the ack.
/// The connection is dropped (closed) on every exit path.
async fn attempt(endpoint: &str, payload: &str) -> io::Result<String> {
    let stream = TcpStream::connect(endpoint).await?;
    let mut stream = BufReader::new(stream);

    stream.get_mut().write_all(payload.as_bytes()).await?;
    stream.get_mut().write_all(b"\n").await?;
    stream.get_mut().flush().await?;

    let mut ack = String::new();
    let read = timeout(ACK_TIMEOUT, stream.read_line(&mut ack))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out waiting for registry acknowledgment",
            )
        })??;

    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "registry closed the connection before acknowledging",
        ));
    }

    Ok(ack)
}

// ─── Tests ───────────────────────────────────────────────────────
