use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{ClientConfig, SessionConfig};
use crate::error::{ClientError, ConfigError};
use crate::interop::InteropAdapter;
use crate::session::{Collaborators, NegotiationStrategy, Session, SessionHandle, spawn};
use crate::signaling::SignalingChannel;
use crate::transport::MediaTransportFactory;
use crate::types::events::{CoreEventBus, Event};

struct ActiveSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Entry point for applications.
///
/// A client runs at most one session at a time. Sessions are driven by
/// feeding inbound signaling through the returned [`SessionHandle`] and
/// observed through the handlers registered on [`Client::events`].
pub struct Client {
    config: Arc<ClientConfig>,
    transports: Arc<dyn MediaTransportFactory>,
    interop: Option<Arc<dyn InteropAdapter>>,
    events: CoreEventBus,
    active: Mutex<Option<ActiveSession>>,
}

impl Client {
    pub fn new(config: ClientConfig, transports: Arc<dyn MediaTransportFactory>) -> Self {
        Self {
            config: Arc::new(config),
            transports,
            interop: None,
            events: CoreEventBus::new(),
            active: Mutex::new(None),
        }
    }

    /// Adapter used when the transport negotiates in Unified-Plan.
    pub fn with_interop(mut self, interop: Arc<dyn InteropAdapter>) -> Self {
        self.interop = Some(interop);
        self
    }

    pub fn events(&self) -> &CoreEventBus {
        &self.events
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Allocate a new room and start a call in it.
    ///
    /// Configuration is checked in order: connection, call type, local
    /// media, PSTN number.
    pub async fn create_session(
        &self,
        config: SessionConfig,
        connection: Option<Arc<dyn SignalingChannel>>,
    ) -> Result<SessionHandle, ClientError> {
        let call_type = config.validate_create(connection.is_some());
        self.start_session(config, connection, call_type).await
    }

    /// Join an existing room.
    ///
    /// Configuration is checked in order: connection, room id, call type,
    /// local media.
    pub async fn join_session(
        &self,
        config: SessionConfig,
        connection: Option<Arc<dyn SignalingChannel>>,
    ) -> Result<SessionHandle, ClientError> {
        let call_type = config.validate_join(connection.is_some());
        self.start_session(config, connection, call_type).await
    }

    async fn start_session(
        &self,
        config: SessionConfig,
        connection: Option<Arc<dyn SignalingChannel>>,
        call_type: Result<rtccore::types::CallType, ConfigError>,
    ) -> Result<SessionHandle, ClientError> {
        let (call_type, signaling) = match (call_type, connection) {
            (Ok(call_type), Some(signaling)) => (call_type, signaling),
            (Err(e), _) => return Err(self.config_error(e)),
            (Ok(_), None) => return Err(self.config_error(ConfigError::MissingConnection)),
        };

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return Err(ClientError::SessionActive);
        }

        let (transport, media_rx) = self.transports.create_transport(&config).await?;
        let strategy = match NegotiationStrategy::for_model(transport.negotiation_model(), self.interop.clone()) {
            Ok(strategy) => strategy,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    warn!("Closing unused transport failed: {close_err}");
                }
                return Err(e.into());
            }
        };

        let mut session = Session::new(
            config,
            call_type,
            self.config.clone(),
            Collaborators {
                transport: transport.clone(),
                signaling,
                strategy,
                events: self.events.clone(),
            },
        );
        if let Err(e) = session.start().await {
            error!("Session {} failed to start: {e}", session.id());
            if let Err(close_err) = transport.close().await {
                warn!("Closing transport failed: {close_err}");
            }
            return Err(e.into());
        }

        info!("Session {} started ({call_type})", session.id());
        let (handle, task) = spawn(session, media_rx);
        *active = Some(ActiveSession {
            handle: handle.clone(),
            task,
        });
        Ok(handle)
    }

    fn config_error(&self, err: ConfigError) -> ClientError {
        warn!("Rejected session configuration: {err}");
        self.events.dispatch(&Event::ConfigurationError {
            message: err.to_string(),
        });
        err.into()
    }

    /// The live session, if any.
    pub async fn session(&self) -> Option<SessionHandle> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|s| !s.task.is_finished())
            .map(|s| s.handle.clone())
    }

    /// End the live session and wait for its task to finish.
    pub async fn end_session(&self) -> Result<(), ClientError> {
        let Some(active) = self.active.lock().await.take() else {
            return Err(ClientError::NoSession);
        };
        if active.handle.end().is_err() {
            info!("Session {} had already ended", active.handle.id());
        }
        if let Err(e) = active.task.await {
            error!("Session task for {} panicked: {e}", active.handle.id());
        }
        Ok(())
    }
}
