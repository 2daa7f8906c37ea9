//! Transport-independent connection handle.
//!
//! A [`Connection`] is what the room core sees of a socket: an identity, an
//! outbound envelope queue and a one-shot close signal. The WebSocket
//! transport owns the receiving half of the queue and writes whatever
//! arrives to the socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Envelope};

#[derive(Debug)]
struct ConnectionInner {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Envelope>,
    closed: watch::Sender<bool>,
}

/// Cheaply cloneable handle to one duplex connection.
///
/// Clones share identity: two handles compare equal iff they refer to the
/// same underlying connection.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

/// Non-owning handle held by hub delivery callbacks.
#[derive(Debug, Clone)]
pub struct WeakConnection {
    inner: Weak<ConnectionInner>,
}

impl Connection {
    /// Creates a connection and the receiver for its outbound envelopes.
    #[must_use]
    pub fn new(peer: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let conn = Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::new(),
                peer,
                outbound,
                closed,
            }),
        };
        (conn, rx)
    }

    /// Returns the stable connection identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the remote address, if the transport knows it.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    /// Queues an envelope for delivery to the client.
    ///
    /// Returns `false` when the transport has already gone away; the
    /// envelope is dropped in that case.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.inner.outbound.send(envelope).is_ok()
    }

    /// Fires the close signal. Only the first call has an effect.
    ///
    /// Returns `true` if this call closed the connection.
    pub fn close(&self) -> bool {
        self.inner.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Returns `true` once [`Connection::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once the connection is closed.
    ///
    /// The returned future does not borrow the handle. It also resolves if
    /// every handle is dropped without an explicit close.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.closed.subscribe();
        async move {
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }

    /// Returns a handle that does not keep the connection alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Connection {}

impl WeakConnection {
    /// Upgrades back to a [`Connection`] if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}
