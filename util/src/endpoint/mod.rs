//! Socket endpoint and connection listener: one OS socket (+ optional TLS) per
//! endpoint, and a listener that drives a single receive loop across a set of
//! endpoints and fans bytes out to each endpoint's callback.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};

use crate::Conn;

const POLL_TIMEOUT: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const RECEIVE_MTU: usize = 8192;

/// Decrypts inbound ciphertext into plaintext for a TLS-wrapped endpoint.
/// Returns `Ok(None)` when the TLS layer consumed the bytes without yielding
/// application data (e.g. a handshake record).
pub trait TlsSession: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Option<Vec<u8>>>;
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
}

pub type DataAvailableFn = Box<
    dyn Fn(Arc<SocketEndpoint>, &[u8], SocketAddr, SocketAddr) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>
        + Send
        + Sync,
>;

/// One socket, its addressing, an optional TLS session, and the callback invoked
/// when the connection listener has plaintext bytes ready for it.
pub struct SocketEndpoint {
    pub(crate) conn: Arc<dyn Conn + Send + Sync>,
    pub local_addr: SocketAddr,
    pub peer_addr: Option<SocketAddr>,
    tls: Option<Box<dyn TlsSession>>,
    connection_closed: AtomicBool,
    receive_data: AtomicBool,
    on_data_available: Mutex<Option<DataAvailableFn>>,
}

impl SocketEndpoint {
    pub fn new(
        conn: Arc<dyn Conn + Send + Sync>,
        local_addr: SocketAddr,
        peer_addr: Option<SocketAddr>,
        tls: Option<Box<dyn TlsSession>>,
    ) -> Self {
        Self {
            conn,
            local_addr,
            peer_addr,
            tls,
            connection_closed: AtomicBool::new(false),
            receive_data: AtomicBool::new(true),
            on_data_available: Mutex::new(None),
        }
    }

    pub async fn set_on_data_available(&self, f: DataAvailableFn) {
        let mut hdlr = self.on_data_available.lock().await;
        *hdlr = Some(f);
    }

    pub fn set_receive_data(&self, enabled: bool) {
        self.receive_data.store(enabled, Ordering::SeqCst);
    }

    pub fn is_connection_closed(&self) -> bool {
        self.connection_closed.load(Ordering::SeqCst)
    }

    pub async fn send(&self, buf: &[u8]) -> Result<usize> {
        let out = if let Some(tls) = &self.tls {
            tls.encrypt(buf)?
        } else {
            buf.to_vec()
        };
        if let Some(peer) = self.peer_addr {
            Ok(self.conn.send_to(&out, peer).await?)
        } else {
            Ok(self.conn.send(&out).await?)
        }
    }

    async fn on_readable(self: &Arc<Self>, raw: &[u8], src: SocketAddr) -> Result<()> {
        let plaintext = if let Some(tls) = &self.tls {
            match tls.decrypt(raw)? {
                Some(bytes) => bytes,
                None => return Ok(()),
            }
        } else {
            raw.to_vec()
        };

        if plaintext.is_empty() || !self.receive_data.load(Ordering::SeqCst) {
            return Ok(());
        }

        let hdlr = self.on_data_available.lock().await;
        if let Some(f) = hdlr.as_ref() {
            f(Arc::clone(self), &plaintext, src, self.local_addr).await?;
        }

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connection_closed.store(true, Ordering::SeqCst);
        self.conn.close().await
    }
}

/// Owns a set of endpoints and a single receive loop. Each iteration polls every
/// endpoint for up to `POLL_TIMEOUT`; on shutdown, all endpoints are closed and
/// released within `SHUTDOWN_GRACE`.
pub struct ConnectionListener {
    endpoints: Arc<Mutex<Vec<Arc<SocketEndpoint>>>>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl ConnectionListener {
    pub fn new() -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let listener = Arc::new(Self {
            endpoints: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        });

        let endpoints = Arc::clone(&listener.endpoints);
        tokio::spawn(Self::receive_loop(endpoints, shutdown_rx));

        listener
    }

    pub async fn add_endpoint(&self, endpoint: Arc<SocketEndpoint>) {
        let mut endpoints = self.endpoints.lock().await;
        endpoints.push(endpoint);
    }

    pub async fn remove_endpoint(&self, local_addr: SocketAddr) {
        let mut endpoints = self.endpoints.lock().await;
        endpoints.retain(|e| e.local_addr != local_addr);
    }

    async fn receive_loop(
        endpoints: Arc<Mutex<Vec<Arc<SocketEndpoint>>>>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        loop {
            let snapshot: Vec<Arc<SocketEndpoint>> = {
                let guard = endpoints.lock().await;
                guard.clone()
            };

            if snapshot.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_TIMEOUT) => {}
                    _ = shutdown_rx.recv() => break,
                }
                continue;
            }

            let polls = snapshot.iter().map(|ep| {
                let ep = Arc::clone(ep);
                async move {
                    let mut buf = vec![0u8; RECEIVE_MTU];
                    let res = tokio::time::timeout(POLL_TIMEOUT, ep.conn.recv_from(&mut buf)).await;
                    (ep, buf, res)
                }
            });

            tokio::select! {
                results = futures_join_all(polls) => {
                    for (ep, buf, res) in results {
                        if let Ok(Ok((n, src))) = res {
                            let _ = ep.on_readable(&buf[..n], src).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        let guard = endpoints.lock().await;
        let closers = guard.iter().map(|ep| {
            let ep = Arc::clone(ep);
            async move {
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, ep.close()).await;
            }
        });
        futures_join_all(closers).await;
    }

    /// Signals shutdown; endpoints are closed within `SHUTDOWN_GRACE` of the
    /// receive loop observing it.
    pub async fn close(&self) {
        let mut tx = self.shutdown_tx.lock().await;
        tx.take();
    }
}

async fn futures_join_all<I>(iter: I) -> Vec<<I::Item as Future>::Output>
where
    I: IntoIterator,
    I::Item: Future,
{
    let mut out = Vec::new();
    for fut in iter {
        out.push(fut.await);
    }
    out
}
