//! Local TCP listeners for reachability tests
//!
//! `LocalListener` binds an ephemeral port on 127.0.0.1 and accepts
//! connections in a background task, closing each one immediately.
//! `closed_port` hands out a port that was bound and then released, so a
//! connection attempt is refused.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

/// Accepting listener on a loopback ephemeral port
///
/// The accept loop is aborted when the listener is dropped.
#[derive(Debug)]
pub struct LocalListener {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl LocalListener {
    /// Bind 127.0.0.1:0 and start accepting
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let accepted = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());

        let counter = accepted.clone();
        let notifier = notify.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!(%peer, "Accepted connection");
                drop(stream);
                counter.fetch_add(1, Ordering::SeqCst);
                notifier.notify_waiters();
            }
        });

        Ok(Self {
            addr,
            accepted,
            notify,
            handle,
        })
    }

    /// Address the listener is bound to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port the listener is bound to
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` connections have been accepted
    pub async fn wait_for_accepts(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.accepted() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for LocalListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A loopback port with nothing listening on it
///
/// The port is bound and released again; another process could in principle
/// grab it in between, which is acceptable for tests.
pub async fn closed_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
