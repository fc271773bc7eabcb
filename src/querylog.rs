//! The query log: one JSON line per resolved question, appended by a
//! dedicated writer task so a single write is always a whole line.

use crate::error::IbexError;
use serde::Serialize;
use std::fmt::Display;
use std::net::IpAddr;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Which listener a query arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp,
    Tcp,
    DohWire,
    DohJson,
}

impl Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Udp => write!(f, "udp"),
            Transport::Tcp => write!(f, "tcp"),
            Transport::DohWire => write!(f, "doh-wire"),
            Transport::DohJson => write!(f, "doh-json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    NxDomain,
    Error,
}

/// Where the answer set came from. Local hits - manual records
/// included - count as CACHED, anything served from an upstream
/// response as UPSTREAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Cached,
    Upstream,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryLogEvent {
    pub timestamp: String,
    pub domain: String,
    pub qtype: String,
    pub transport: String,
    pub outcome: Outcome,
    pub answer_count: usize,
    pub source: Source,
    pub client_ip: String,
}

/// Cloneable handle for emitting query events. A disabled handle (used
/// in tests) swallows everything.
#[derive(Debug, Clone)]
pub struct QueryLog {
    tx: Option<mpsc::Sender<QueryLogEvent>>,
}

impl QueryLog {
    pub fn disabled() -> Self {
        QueryLog { tx: None }
    }

    /// Open `<log_directory>/queries.log` for appending and spawn the
    /// writer task behind a channel.
    pub async fn start(log_directory: &Path) -> Result<(Self, JoinHandle<()>), IbexError> {
        tokio::fs::create_dir_all(log_directory).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_directory.join("queries.log"))
            .await?;
        let (tx, mut rx) = mpsc::channel::<QueryLogEvent>(1024);
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(err) => {
                        error!("failed to serialize query log event: {err}");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(err) = file.write_all(line.as_bytes()).await {
                    error!("failed to append to query log: {err}");
                }
            }
        });
        Ok((QueryLog { tx: Some(tx) }, handle))
    }

    /// Queue one event. Never blocks the resolver: a full queue drops
    /// the event.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        domain: &str,
        qtype: impl Display,
        transport: Transport,
        outcome: Outcome,
        answer_count: usize,
        source: Source,
        client_ip: Option<IpAddr>,
    ) {
        let Some(tx) = &self.tx else {
            return;
        };
        let event = QueryLogEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            domain: domain.to_string(),
            qtype: qtype.to_string(),
            transport: transport.to_string(),
            outcome,
            answer_count,
            source,
            client_ip: client_ip
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        };
        if tx.try_send(event).is_err() {
            debug!("query log queue full, dropping event");
        }
    }
}
