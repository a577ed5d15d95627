//! Inbound datagram demultiplexer, the connection-state machine derived from
//! ICE and DTLS, and the subset of the remote SDP the peer connection reads
//! off directly rather than handing to a transceiver.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use ice::agent::Agent as IceAgent;
use ice::state::ConnectionState as IceConnectionState;
use portable_atomic::AtomicBool;
use sdp::description::session::SessionDescription;
use tokio::sync::Mutex;

use crate::data_channel::DataChannelRegistry;
use crate::rtp_transceiver::{RtpReceiver, RtpSender};

/// Mirrors the W3C `RTCDtlsTransportState` names; the concrete DTLS session
/// type lives in the `dtls` crate and is reported through this instead of
/// being matched on directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsState {
    New,
    Connecting,
    Connected,
    Closed,
    Failed,
}

/// Route for one inbound datagram, decided from its first (and, for the
/// SRTP/SRTCP range, second) byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Route {
    Stun,
    Dtls,
    Srtcp,
    Srtp,
    Drop,
}

pub fn classify(datagram: &[u8]) -> Route {
    let Some(&first) = datagram.first() else {
        return Route::Drop;
    };
    match first {
        0..=3 => Route::Stun,
        20..=63 => Route::Dtls,
        128..=191 => match datagram.get(1) {
            Some(&second) if (192..=223).contains(&second) => Route::Srtcp,
            _ => Route::Srtp,
        },
        _ => Route::Drop,
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PeerConnectionState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

/// Derives the peer connection's lifecycle state from its ICE agent state and
/// DTLS transport state. `closed` takes priority over anything the
/// transports report, matching an explicit application-initiated close.
pub fn derive_state(ice: IceConnectionState, dtls: DtlsState, closed: bool) -> PeerConnectionState {
    if closed {
        return PeerConnectionState::Closed;
    }
    if dtls == DtlsState::Failed || ice == IceConnectionState::Failed {
        return PeerConnectionState::Failed;
    }
    if ice == IceConnectionState::Disconnected {
        return PeerConnectionState::Disconnected;
    }
    if dtls == DtlsState::Connected && ice_is_connected(ice) {
        return PeerConnectionState::Connected;
    }
    if ice == IceConnectionState::New && dtls == DtlsState::New {
        return PeerConnectionState::New;
    }
    PeerConnectionState::Connecting
}

fn ice_is_connected(ice: IceConnectionState) -> bool {
    matches!(
        ice,
        IceConnectionState::Connected | IceConnectionState::Nominating | IceConnectionState::Ready
    )
}

/// The subset of remote-SDP attributes the peer connection itself acts on;
/// everything codec/payload-type related is handed to the transceivers.
#[derive(Debug, Default, Clone)]
pub struct RemoteSessionAttributes {
    pub fingerprint_algorithm: Option<String>,
    pub fingerprint_hex: Option<String>,
    pub setup: Option<String>,
    pub ice_ufrag: Option<String>,
    pub ice_pwd: Option<String>,
    pub ice_trickle: bool,
    pub candidates: Vec<String>,
    pub sctp_enabled: bool,
}

/// Reads the session- and media-level attributes the peer connection needs
/// directly out of a parsed remote SDP. Session-level values are used as a
/// fallback when a media section doesn't repeat them.
pub fn read_remote_attributes(desc: &SessionDescription) -> RemoteSessionAttributes {
    let mut out = RemoteSessionAttributes::default();

    if let Some(fp) = desc.attribute("fingerprint") {
        apply_fingerprint(&mut out, fp);
    }
    if let Some(ufrag) = desc.attribute("ice-ufrag") {
        out.ice_ufrag = Some(ufrag.clone());
    }
    if let Some(pwd) = desc.attribute("ice-pwd") {
        out.ice_pwd = Some(pwd.clone());
    }
    if let Some(options) = desc.attribute("ice-options") {
        out.ice_trickle = options.split_whitespace().any(|o| o == "trickle");
    }

    for media in &desc.media_descriptions {
        if out.fingerprint_hex.is_none() {
            if let Some(Some(fp)) = media.attribute("fingerprint") {
                apply_fingerprint(&mut out, &fp.to_owned());
            }
        }
        if out.setup.is_none() {
            if let Some(Some(setup)) = media.attribute("setup") {
                out.setup = Some(setup.to_owned());
            }
        }
        if out.ice_ufrag.is_none() {
            if let Some(Some(ufrag)) = media.attribute("ice-ufrag") {
                out.ice_ufrag = Some(ufrag.to_owned());
            }
        }
        if out.ice_pwd.is_none() {
            if let Some(Some(pwd)) = media.attribute("ice-pwd") {
                out.ice_pwd = Some(pwd.to_owned());
            }
        }
        for attr in &media.attributes {
            if attr.key == "candidate" {
                if let Some(value) = &attr.value {
                    out.candidates.push(value.clone());
                }
            }
        }
        if media.media_name.media == "application" {
            out.sctp_enabled = true;
        }
    }

    out
}

fn apply_fingerprint(out: &mut RemoteSessionAttributes, raw: &str) {
    let mut parts = raw.splitn(2, ' ');
    out.fingerprint_algorithm = parts.next().map(|s| s.to_lowercase());
    out.fingerprint_hex = parts.next().map(|s| s.replace(':', "").to_lowercase());
}

/// True if the remote ufrag/pwd in `new_attrs` differ from the ones last
/// negotiated, meaning the local side must regenerate its own credentials
/// and restart ICE.
pub fn requires_ice_restart(
    previous_ufrag: Option<&str>,
    previous_pwd: Option<&str>,
    new_attrs: &RemoteSessionAttributes,
) -> bool {
    previous_ufrag.is_some()
        && (previous_ufrag != new_attrs.ice_ufrag.as_deref()
            || previous_pwd != new_attrs.ice_pwd.as_deref())
}

pub type OnStateChangeHdlrFn = Box<
    dyn (FnMut(PeerConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// Local ICE credentials, regenerated whenever `requires_ice_restart` fires.
#[derive(Debug, Clone, Default)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: String,
}

/// One peer connection: the ICE agent, the negotiated transceivers and data
/// channels, and the lifecycle state derived from ICE+DTLS. The DTLS
/// transport and any SRTP/SCTP sessions built on top of it are owned by the
/// caller and reported in through `set_dtls_state`/the transceiver/
/// data-channel mutation methods rather than held here as concrete types:
/// their construction depends on the negotiated DTLS role and certificate,
/// which aren't known until the SDP exchange completes, whereas the ICE
/// agent can be created (though not yet started) as soon as the peer
/// connection is.
pub struct PeerConnection {
    pub local_ice_credentials: Mutex<IceCredentials>,
    pub remote_attributes: Mutex<Option<RemoteSessionAttributes>>,

    ice_agent: ArcSwapOption<IceAgent>,
    ice_state: Mutex<IceConnectionState>,
    dtls_state: Mutex<DtlsState>,
    closed: AtomicBool,
    state: ArcSwap<PeerConnectionState>,

    pub senders: Mutex<HashMap<u32, RtpSender>>,
    pub receivers: Mutex<HashMap<u32, RtpReceiver>>,
    pub data_channels: Mutex<DataChannelRegistry>,

    on_state_change: ArcSwapOption<Mutex<OnStateChangeHdlrFn>>,
}

impl PeerConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            local_ice_credentials: Mutex::new(IceCredentials::default()),
            remote_attributes: Mutex::new(None),
            ice_agent: ArcSwapOption::empty(),
            ice_state: Mutex::new(IceConnectionState::New),
            dtls_state: Mutex::new(DtlsState::New),
            closed: AtomicBool::new(false),
            state: ArcSwap::from_pointee(PeerConnectionState::New),
            senders: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashMap::new()),
            data_channels: Mutex::new(DataChannelRegistry::new()),
            on_state_change: ArcSwapOption::empty(),
        })
    }

    /// Attaches the ICE agent built for this connection once its config
    /// (gathered from the negotiated SDP and the resolved ICE servers) is
    /// known. `connection_state` tracks this agent's state from then on via
    /// `set_ice_state`, typically driven by the agent's own
    /// `on_connection_state_change` callback.
    pub fn attach_ice_agent(&self, agent: Arc<IceAgent>) {
        self.ice_agent.store(Some(agent));
    }

    pub fn ice_agent(&self) -> Option<Arc<IceAgent>> {
        self.ice_agent.load_full()
    }

    pub fn on_state_change(&self, handler: OnStateChangeHdlrFn) {
        self.on_state_change.store(Some(Arc::new(Mutex::new(handler))));
    }

    pub fn connection_state(&self) -> PeerConnectionState {
        **self.state.load()
    }

    async fn recompute_state(&self) {
        let ice = *self.ice_state.lock().await;
        let dtls = *self.dtls_state.lock().await;
        let closed = self.closed.load(Ordering::SeqCst);
        let next = derive_state(ice, dtls, closed);

        if **self.state.load() == next {
            return;
        }
        self.state.store(Arc::new(next));

        if let Some(handler) = self.on_state_change.load_full() {
            let mut guard = handler.lock().await;
            (guard)(next).await;
        }
    }

    pub async fn set_ice_state(&self, ice: IceConnectionState) {
        *self.ice_state.lock().await = ice;
        self.recompute_state().await;
    }

    pub async fn set_dtls_state(&self, dtls: DtlsState) {
        *self.dtls_state.lock().await = dtls;
        self.recompute_state().await;
    }

    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.recompute_state().await;
    }

    /// Applies a freshly-parsed remote SDP's attributes, returning whether
    /// this requires an ICE restart (remote ufrag/pwd changed from the last
    /// negotiation).
    pub async fn apply_remote_attributes(&self, attrs: RemoteSessionAttributes) -> bool {
        let mut remote = self.remote_attributes.lock().await;
        let restart = match remote.as_ref() {
            Some(previous) => requires_ice_restart(
                previous.ice_ufrag.as_deref(),
                previous.ice_pwd.as_deref(),
                &attrs,
            ),
            None => false,
        };
        *remote = Some(attrs);
        restart
    }
}
