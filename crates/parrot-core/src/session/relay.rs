//! Relay session - JSON frames over TCP
//!
//! ## Wire Format
//!
//! One JSON object per line, tagged by `type`:
//!
//! ```text
//! client → relay   {"type":"hello","identity":"1337ABCD","nickname":"parrot"}
//! client → relay   {"type":"submit","message":{"kind":"text",...}}
//! relay  → client  {"type":"ack","id":[...]}            submit accepted
//! relay  → client  {"type":"reject","id":[...],"reason":"..."}
//! relay  → client  {"type":"deliver","message":{"kind":"text",...}}
//! relay  → client  {"type":"error","reason":"..."}      one inbound failed
//! ```
//!
//! The relay is trusted to have authenticated and decrypted what it
//! delivers. A line that does not decode becomes an [`InboundEvent::Error`]
//! and the stream keeps going; only a broken connection ends it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use super::{InboundReceiver, Session};
use crate::error::{AgentError, AgentResult};
use crate::message::{InboundEvent, InboundMessage, OutboundMessage};
use crate::types::{Identity, MessageId};

/// Longest accepted line on the relay connection.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// How long `submit` waits for the relay to accept a message.
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// One line on the relay connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Hello { identity: Identity, nickname: String },
    Submit { message: OutboundMessage },
    Ack { id: MessageId },
    Reject { id: MessageId, reason: String },
    Deliver { message: InboundMessage },
    Error { reason: String },
}

/// Submits waiting for an ack; `None` once the reader has stopped
type Pending = Arc<Mutex<Option<HashMap<MessageId, oneshot::Sender<AgentResult<MessageId>>>>>>;

/// Session connected to a relay over TCP
pub struct RelaySession {
    outgoing: mpsc::UnboundedSender<RelayFrame>,
    pending: Pending,
    ack_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RelaySession {
    /// Connect to `addr`, announce `own` and start the reader/writer tasks.
    pub async fn connect(
        addr: &str,
        own: Identity,
        nickname: &str,
    ) -> AgentResult<(Self, InboundReceiver)> {
        let stream = TcpStream::connect(addr).await?;
        info!(%addr, identity = %own, "Connected to relay");
        let (read_half, write_half) = stream.into_split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(Some(HashMap::new())));

        out_tx
            .send(RelayFrame::Hello {
                identity: own,
                nickname: nickname.to_string(),
            })
            .map_err(|_| AgentError::SessionClosed)?;

        let writer = tokio::spawn(async move {
            let mut writer =
                FramedWrite::new(write_half, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
            while let Some(frame) = out_rx.recv().await {
                let line = match serde_json::to_string(&frame) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode relay frame");
                        continue;
                    }
                };
                if let Err(e) = writer.send(line).await {
                    warn!(error = %e, "Relay write failed");
                    break;
                }
            }
            debug!("Relay writer stopped");
        });

        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut reader =
                FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
            while let Some(item) = reader.next().await {
                let line = match item {
                    Ok(line) => line,
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        let _ = inbound_tx.send(InboundEvent::Error(format!(
                            "frame exceeds {} bytes",
                            MAX_FRAME_BYTES
                        )));
                        continue;
                    }
                    Err(LinesCodecError::Io(e)) => {
                        warn!(error = %e, "Relay read failed");
                        break;
                    }
                };

                match serde_json::from_str::<RelayFrame>(&line) {
                    Ok(RelayFrame::Deliver { message }) => {
                        if inbound_tx.send(InboundEvent::Message(message)).is_err() {
                            break;
                        }
                    }
                    Ok(RelayFrame::Ack { id }) => complete(&reader_pending, id, Ok(id)),
                    Ok(RelayFrame::Reject { id, reason }) => {
                        complete(&reader_pending, id, Err(AgentError::Send(reason)))
                    }
                    Ok(RelayFrame::Error { reason }) => {
                        let _ = inbound_tx.send(InboundEvent::Error(reason));
                    }
                    Ok(other) => debug!(?other, "Ignoring unexpected frame from relay"),
                    Err(e) => {
                        let _ = inbound_tx
                            .send(InboundEvent::Error(format!("undecodable frame: {}", e)));
                    }
                }
            }

            info!("Relay connection closed");
            let waiters = reader_pending.lock().take();
            for (_, waiter) in waiters.into_iter().flatten() {
                let _ = waiter.send(Err(AgentError::SessionClosed));
            }
        });

        Ok((
            Self {
                outgoing: out_tx,
                pending,
                ack_timeout: ACK_TIMEOUT,
                reader,
                writer,
            },
            inbound_rx,
        ))
    }

    fn forget(&self, id: &MessageId) {
        if let Some(waiters) = self.pending.lock().as_mut() {
            waiters.remove(id);
        }
    }

    /// Override how long `submit` waits for an ack
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

fn complete(pending: &Pending, id: MessageId, result: AgentResult<MessageId>) {
    let waiter = pending.lock().as_mut().and_then(|waiters| waiters.remove(&id));
    match waiter {
        Some(waiter) => {
            let _ = waiter.send(result);
        }
        None => debug!(%id, "Relay answered for a message nobody waits for"),
    }
}

#[async_trait]
impl Session for RelaySession {
    async fn submit(&self, message: OutboundMessage) -> AgentResult<MessageId> {
        let id = message.id();
        let (tx, rx) = oneshot::channel();
        match self.pending.lock().as_mut() {
            Some(waiters) => {
                waiters.insert(id, tx);
            }
            None => return Err(AgentError::SessionClosed),
        }

        if self.outgoing.send(RelayFrame::Submit { message }).is_err() {
            self.forget(&id);
            return Err(AgentError::SessionClosed);
        }

        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AgentError::SessionClosed),
            Err(_) => {
                self.forget(&id);
                Err(AgentError::Send(format!(
                    "relay did not acknowledge {} within {:?}",
                    id, self.ack_timeout
                )))
            }
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
