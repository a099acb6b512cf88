//! Operator console input
//!
//! Each line is `IDENTITY` immediately followed by the message body, e.g.
//! `ECHOECHOhello there`. The identity is upper-cased before validation;
//! the body is sent as typed.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AgentResult;
use crate::events::{triage, AgentEvent, EventSender};
use crate::gateway::OutboundGateway;
use crate::types::{Identity, MessageId, IDENTITY_LEN};

/// Split an operator line into destination and body.
///
/// A trailing `\n` or `\r\n` is dropped. Returns `None` when the line is
/// shorter than an identity or its first eight characters are not a valid
/// identity once upper-cased.
pub fn parse_line(line: &str) -> Option<(Identity, &str)> {
    let line = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);
    let head = line.get(..IDENTITY_LEN)?;
    let identity = Identity::parse(head).ok()?;
    Some((identity, &line[IDENTITY_LEN..]))
}

/// Reads operator lines and sends them as 1:1 texts
#[derive(Clone)]
pub struct InteractiveSender {
    gateway: OutboundGateway,
    events: EventSender,
}

impl InteractiveSender {
    pub fn new(gateway: OutboundGateway, events: EventSender) -> Self {
        Self { gateway, events }
    }

    /// Send `body` to `destination` and report it like a typed line.
    ///
    /// Used for the startup test message as well as for console input.
    pub async fn send(&self, destination: &Identity, body: &str) -> AgentResult<Option<MessageId>> {
        let sent = triage(&self.events, self.gateway.send_text(destination, body).await)?;
        Ok(sent.map(|(id, contact)| {
            let _ = self.events.send(AgentEvent::MessageSent {
                id,
                to: contact,
                body: body.to_string(),
            });
            id
        }))
    }

    /// Handle a single operator line.
    ///
    /// Invalid lines publish [`AgentEvent::InvalidInput`] and send nothing.
    pub async fn handle_line(&self, line: &str) -> AgentResult<Option<MessageId>> {
        match parse_line(line) {
            Some((destination, body)) => self.send(&destination, body).await,
            None => {
                debug!(len = line.len(), "Rejected operator line");
                let _ = self.events.send(AgentEvent::InvalidInput);
                Ok(None)
            }
        }
    }

    /// Read lines from `input` until end of input or `shutdown`.
    ///
    /// Bytes that are not UTF-8 are replaced, so a garbled line is reported
    /// as invalid input instead of ending the loop.
    pub async fn run<R>(&self, mut input: R, shutdown: CancellationToken) -> AgentResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                read = input.read_until(b'\n', &mut buf) => {
                    if read? == 0 {
                        info!("End of operator input");
                        return Ok(());
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    self.handle_line(&line).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        let (id, body) = parse_line("ECHOECHOhello there\n").unwrap();
        assert_eq!(id.as_str(), "ECHOECHO");
        assert_eq!(body, "hello there");
    }

    #[test]
    fn test_parse_lowercase_identity() {
        let (id, body) = parse_line("echoechoHi\r\n").unwrap();
        assert_eq!(id.as_str(), "ECHOECHO");
        assert_eq!(body, "Hi");
    }

    #[test]
    fn test_parse_empty_body() {
        let (_, body) = parse_line("ECHOECHO").unwrap();
        assert_eq!(body, "");
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert!(parse_line("hello\n").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_parse_rejects_bad_identity() {
        assert!(parse_line("ECHO-ECHhi").is_none());
        assert!(parse_line("ECHO ECHhi").is_none());
    }

    #[test]
    fn test_parse_multibyte_prefix() {
        assert!(parse_line("ÄÄÄÄÄÄÄÄhi").is_none());
        assert!(parse_line("ECHOECHäöü").is_none());
    }
}
