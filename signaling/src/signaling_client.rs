//! Orchestrates the pieces in `fsm`, `cache`, `control_plane` and `client`
//! into one signaling-client object: drives the connection state machine
//! from real control-plane/WebSocket outcomes, applies the caching policy
//! before `describe`/`get-endpoint`, and retries non-auth failures with
//! exponential backoff up to `fsm::DEFAULT_RETRY_COUNT`.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use crate::cache::{should_skip_describe_and_endpoint, CachedChannel, CachingPolicy};
use crate::client::SignalingSession;
use crate::control_plane::{ControlPlaneClient, Endpoints, IceServerEntry};
use crate::error::{Error, Result};
use crate::fsm::{self, Event, State};
use crate::message::{Action, InboundMessage, OutboundMessage};

pub struct SignalingClientConfig {
    pub channel_name: String,
    pub region: String,
    pub role: String,
    pub caching_policy: CachingPolicy,
    pub caching_period: Duration,
}

/// Ties the control-plane client, the cached-channel record, and the
/// WebSocket session together behind the connection FSM. `bearer_token` is
/// held behind a mutex so credential refreshes (a `GetCredentials` retry)
/// can rotate it without rebuilding the client.
pub struct SignalingClient {
    config: SignalingClientConfig,
    control_plane: ControlPlaneClient,
    bearer_token: Mutex<String>,
    state: Mutex<State>,
    channel_arn: Mutex<Option<String>>,
    endpoints: Mutex<Option<Endpoints>>,
    ice_servers: Mutex<Vec<IceServerEntry>>,
    cached: Mutex<Option<CachedChannel>>,
    session: Mutex<Option<SignalingSession>>,
}

impl SignalingClient {
    pub fn new(
        config: SignalingClientConfig,
        control_plane: ControlPlaneClient,
        bearer_token: impl Into<String>,
        cached: Option<CachedChannel>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            control_plane,
            bearer_token: Mutex::new(bearer_token.into()),
            state: Mutex::new(State::New),
            channel_arn: Mutex::new(None),
            endpoints: Mutex::new(None),
            ice_servers: Mutex::new(Vec::new()),
            cached: Mutex::new(cached),
            session: Mutex::new(None),
        })
    }

    pub async fn state(&self) -> State {
        *self.state.lock().await
    }

    async fn advance(&self, event: Event) -> Result<State> {
        let mut state = self.state.lock().await;
        let next = fsm::transition(*state, event)
            .ok_or(Error::InvalidState("event not valid from current state"))?;
        *state = next;
        Ok(next)
    }

    /// Runs `new -> ... -> ready -> connect -> connected`, retrying each
    /// control-plane step with exponential backoff on non-auth errors.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        self.advance(Event::CredentialsObtained).await?;
        self.run_with_retry(Self::describe_or_create).await?;
        self.run_with_retry(Self::resolve_endpoint).await?;
        self.run_with_retry(Self::refresh_ice_config).await?;
        self.advance(Event::ConnectRequested).await?;
        self.open_websocket().await?;
        self.advance(Event::WsHandshakeComplete).await?;
        Ok(())
    }

    async fn run_with_retry<F, Fut>(self: &Arc<Self>, step: F) -> Result<()>
    where
        F: Fn(Arc<Self>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let mut attempt = 0;
        loop {
            match step(self.clone()).await {
                Ok(()) => return Ok(()),
                Err(Error::Unauthorized) => return Err(Error::Unauthorized),
                Err(e) if attempt < fsm::DEFAULT_RETRY_COUNT => {
                    attempt += 1;
                    log::warn!("signaling step failed (attempt {attempt}): {e}");
                    tokio::time::sleep(Duration::from_millis(250 * 2u64.pow(attempt))).await;
                }
                Err(e) => {
                    log::error!("signaling step exhausted retries: {e}");
                    return Err(Error::RetryBudgetExhausted(fsm::DEFAULT_RETRY_COUNT));
                }
            }
        }
    }

    async fn describe_or_create(self: Arc<Self>) -> Result<()> {
        if should_skip_describe_and_endpoint(
            self.config.caching_policy,
            self.cached.lock().await.as_ref(),
            self.config.caching_period,
            SystemTime::now(),
        ) {
            let arn = self.cached.lock().await.as_ref().unwrap().channel_arn.clone();
            *self.channel_arn.lock().await = Some(arn);
            self.advance(Event::DescribeSucceeded).await?;
            return Ok(());
        }

        let token = self.bearer_token.lock().await.clone();
        match self
            .control_plane
            .describe_signaling_channel(&token, &self.config.channel_name)
            .await?
        {
            Some(arn) => {
                *self.channel_arn.lock().await = Some(arn);
                self.advance(Event::DescribeSucceeded).await?;
            }
            None => {
                self.advance(Event::DescribeNotFound).await?;
                let arn = self
                    .control_plane
                    .create_signaling_channel(&token, &self.config.channel_name)
                    .await?;
                *self.channel_arn.lock().await = Some(arn);
                self.advance(Event::ChannelCreated).await?;
            }
        }
        Ok(())
    }

    async fn resolve_endpoint(self: Arc<Self>) -> Result<()> {
        let token = self.bearer_token.lock().await.clone();
        let arn = self
            .channel_arn
            .lock()
            .await
            .clone()
            .ok_or(Error::InvalidState("endpoint resolution needs a channel arn"))?;
        let endpoints = self
            .control_plane
            .get_signaling_channel_endpoint(&token, &arn, &self.config.role)
            .await?;
        *self.endpoints.lock().await = Some(endpoints);
        self.advance(Event::EndpointObtained).await?;
        Ok(())
    }

    /// Refetches ICE server config. Reachable both from the initial connect
    /// sequence and, via `handle_inbound`, from a live `connected` session.
    async fn refresh_ice_config(self: Arc<Self>) -> Result<()> {
        let token = self.bearer_token.lock().await.clone();
        let arn = self
            .channel_arn
            .lock()
            .await
            .clone()
            .ok_or(Error::InvalidState("ice config refresh needs a channel arn"))?;
        let servers = self
            .control_plane
            .get_ice_server_config(&token, &arn, None)
            .await?;
        *self.ice_servers.lock().await = servers;
        self.advance(Event::IceConfigObtained).await?;
        Ok(())
    }

    pub async fn ice_servers(&self) -> Vec<IceServerEntry> {
        self.ice_servers.lock().await.clone()
    }

    async fn open_websocket(self: &Arc<Self>) -> Result<()> {
        let wss_endpoint = self
            .endpoints
            .lock()
            .await
            .as_ref()
            .and_then(|e| e.wss_endpoint.clone())
            .ok_or(Error::InvalidState("no wss endpoint resolved"))?;

        let this = Arc::clone(self);
        let session = SignalingSession::connect(&wss_endpoint, move |message| {
            let this = Arc::clone(&this);
            tokio::spawn(async move {
                this.handle_inbound(message).await;
            });
        })
        .await?;

        *self.session.lock().await = Some(session);
        Ok(())
    }

    /// Sends one SDP/ICE message over the live session.
    pub async fn send(&self, action: Action, recipient_client_id: &str, payload: &[u8]) -> Result<String> {
        let session = self.session.lock().await;
        let session = session
            .as_ref()
            .ok_or(Error::InvalidState("not connected"))?;
        session
            .send(OutboundMessage::new(action, recipient_client_id, payload, None))
            .await
    }

    /// Reacts to one parsed inbound message, driving the FSM and (for
    /// `GO_AWAY`/`RECONNECT_ICE_SERVER`/socket-close) re-entering the
    /// appropriate earlier state per §4.9.
    async fn handle_inbound(self: Arc<Self>, message: InboundMessage) {
        match message {
            InboundMessage::StatusResponse {
                correlation_id,
                status,
                description,
            } => {
                if let Some(key) = correlation_id {
                    if let Some(session) = self.session.lock().await.as_ref() {
                        session.complete(&key).await;
                    }
                }
                if status != crate::message::ApiCallStatus::Ok {
                    log::warn!("signaling status response not ok: {description}");
                    let _ = self.advance(Event::WsClosed).await;
                    *self.session.lock().await = None;
                    let _ = self.connect().await;
                }
            }
            InboundMessage::GoAway | InboundMessage::CtrlClose => {
                let _ = self.advance(Event::WsClosed).await;
                *self.session.lock().await = None;
                let _ = self.connect().await;
            }
            InboundMessage::ReconnectIceServer => {
                let _ = self.advance(Event::ServerReconnectIce).await;
                *self.session.lock().await = None;
                if self.refresh_ice_config_and_reconnect().await.is_err() {
                    log::warn!("failed to refresh ice config after server-requested reconnect");
                }
            }
            InboundMessage::SdpOffer { .. } | InboundMessage::SdpAnswer { .. } | InboundMessage::IceCandidate { .. } => {
                // Routed to the peer-connection layer by the caller's own
                // `on_message` wiring; nothing for the FSM to do here.
            }
        }
    }

    async fn refresh_ice_config_and_reconnect(self: &Arc<Self>) -> Result<()> {
        Arc::clone(self).refresh_ice_config().await?;
        self.open_websocket().await?;
        self.advance(Event::WsHandshakeComplete).await?;
        Ok(())
    }

    pub async fn delete(self: &Arc<Self>) -> Result<()> {
        let token = self.bearer_token.lock().await.clone();
        let arn = self.channel_arn.lock().await.clone();
        if let Some(arn) = arn {
            self.control_plane.delete_signaling_channel(&token, &arn).await?;
        }
        self.advance(Event::DeleteRequested).await?;
        *self.session.lock().await = None;
        Ok(())
    }
}
