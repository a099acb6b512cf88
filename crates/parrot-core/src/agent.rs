//! Agent - wiring and supervision
//!
//! [`Agent`] owns the stores and the shared components, hands out the two
//! long-running workers and runs them until input ends, the session goes
//! away or shutdown is requested.
//!
//! ```text
//!            ┌──────────────┐   InboundEvent    ┌────────────┐
//!  session ─▶│ mpsc (ordered)│ ───────────────▶ │ Dispatcher │──┐
//!            └──────────────┘                   └────────────┘  │
//!  stdin ──▶ InteractiveSender ──▶ OutboundGateway ◀────────────┘
//!                                     │
//!                          ContactResolver ──▶ DirectoryService
//! ```

use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AgentConfig, Transport};
use crate::directory::{DirectoryService, HttpDirectory};
use crate::dispatcher::{DispatchExit, Dispatcher};
use crate::error::{AgentError, AgentResult};
use crate::events::{event_channel, AgentEvent, EventSender};
use crate::gateway::OutboundGateway;
use crate::identity::LocalIdentity;
use crate::interactive::InteractiveSender;
use crate::resolver::ContactResolver;
use crate::session::{InboundReceiver, LoopbackSession, RelaySession, Session};
use crate::storage::{ContactStore, GroupStore};
use crate::types::{Identity, MessageId};

/// A configured agent ready to run
pub struct Agent {
    own: Identity,
    config: AgentConfig,
    contacts: Arc<ContactStore>,
    groups: Arc<GroupStore>,
    resolver: Arc<ContactResolver>,
    gateway: OutboundGateway,
    events: EventSender,
}

impl Agent {
    /// Load both stores and wire the components around `session`.
    pub fn new(
        identity: &LocalIdentity,
        config: AgentConfig,
        session: Arc<dyn Session>,
        directory: Arc<dyn DirectoryService>,
    ) -> AgentResult<Self> {
        let own = identity.identity();
        let contacts = Arc::new(ContactStore::load(&config.paths.address_book)?);
        let groups = Arc::new(GroupStore::load(&config.paths.group_directory)?);
        info!(
            %own,
            contacts = contacts.len(),
            groups = groups.len(),
            "Loaded local state"
        );

        let (events, _) = event_channel();
        let resolver = Arc::new(
            ContactResolver::new(contacts.clone(), directory, events.clone())
                .with_retry(config.retry),
        );
        let gateway = OutboundGateway::new(own, session, resolver.clone());

        Ok(Self {
            own,
            config,
            contacts,
            groups,
            resolver,
            gateway,
            events,
        })
    }

    /// Start the configured session and directory client, then build the agent.
    pub async fn connect(
        identity: &LocalIdentity,
        config: AgentConfig,
    ) -> AgentResult<(Self, InboundReceiver)> {
        let own = identity.identity();
        let (session, inbound): (Arc<dyn Session>, InboundReceiver) = match &config.transport {
            Transport::Loopback => {
                let (session, inbound) = LoopbackSession::start(own, config.nickname.clone());
                (Arc::new(session), inbound)
            }
            Transport::Relay(addr) => {
                let (session, inbound) = RelaySession::connect(addr, own, &config.nickname)
                    .await
                    .map_err(|e| match e {
                        AgentError::Io(io) => {
                            AgentError::Config(format!("cannot reach relay {}: {}", addr, io))
                        }
                        other => other,
                    })?;
                (Arc::new(session), inbound)
            }
        };
        let directory = Arc::new(HttpDirectory::new(&config.directory_url)?);

        Ok((Self::new(identity, config, session, directory)?, inbound))
    }

    pub fn identity(&self) -> Identity {
        self.own
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn contacts(&self) -> &Arc<ContactStore> {
        &self.contacts
    }

    pub fn groups(&self) -> &Arc<GroupStore> {
        &self.groups
    }

    /// Receive everything the agent reports from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.resolver.clone(),
            self.groups.clone(),
            self.gateway.clone(),
            self.events.clone(),
            self.config.dispatch.clone(),
        )
    }

    pub fn sender(&self) -> InteractiveSender {
        InteractiveSender::new(self.gateway.clone(), self.events.clone())
    }

    /// Send the startup test message.
    pub async fn send_test_message(
        &self,
        destination: &Identity,
        body: &str,
    ) -> AgentResult<Option<MessageId>> {
        info!(%destination, "Sending test message");
        self.sender().send(destination, body).await
    }

    /// Run the dispatcher and the interactive sender.
    ///
    /// The agent runs until the inbound stream closes, `shutdown` is
    /// cancelled or either worker hits a fatal error. End of `input` alone
    /// only stops the sender; the session decides whether its inbound
    /// stream ends with it. The stores are flushed before this returns.
    pub async fn run<R>(
        &self,
        inbound: InboundReceiver,
        input: R,
        shutdown: CancellationToken,
    ) -> AgentResult<DispatchExit>
    where
        R: AsyncBufRead + Unpin,
    {
        let dispatcher = self.dispatcher();
        let token = shutdown.clone();
        let mut dispatch = tokio::spawn(async move { dispatcher.run(inbound, token).await });
        let sender = self.sender();

        let input_result = tokio::select! {
            result = sender.run(input, shutdown.clone()) => result,
            joined = &mut dispatch => {
                shutdown.cancel();
                return flatten(joined);
            }
        };

        match input_result {
            Ok(()) => {
                self.gateway.input_ended();
                flatten(dispatch.await)
            }
            Err(e) => {
                warn!(error = %e, "Operator input failed");
                shutdown.cancel();
                flatten(dispatch.await)?;
                Err(e)
            }
        }
    }
}

fn flatten(joined: Result<AgentResult<DispatchExit>, JoinError>) -> AgentResult<DispatchExit> {
    joined.map_err(|e| AgentError::Io(std::io::Error::other(e)))?
}
