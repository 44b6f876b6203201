//! Mutex-guarded set of connected event subscribers
//!
//! Shared between the accept thread (add, reap) and the sensing thread
//! (broadcast). Every operation holds the lock for its full duration, so a
//! broadcast never races a removal.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

use log::debug;
use parking_lot::Mutex;

/// A subscriber connection
pub trait EventClient: Send {
    /// Write the whole buffer without blocking; any error drops the client
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Peer has gone away
    fn is_disconnected(&mut self) -> bool;

    /// Best-effort close
    fn close(&mut self);
}

impl EventClient for UnixStream {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    /// Subscribers never send anything meaningful. At most one buffer of
    /// inbound bytes is discarded per call; data or would-block means alive,
    /// EOF or a hard error means gone.
    fn is_disconnected(&mut self) -> bool {
        let mut buf = [0u8; 4096];
        loop {
            match self.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => return false,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return true,
            }
        }
    }

    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Clients removed because the send failed
    pub dropped: usize,
}

/// Connected clients
pub struct ClientRegistry<C: EventClient> {
    clients: Mutex<Vec<C>>,
}

impl<C: EventClient> ClientRegistry<C> {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Register a client; returns the new count
    pub fn add(&self, client: C) -> usize {
        let mut clients = self.clients.lock();
        clients.push(client);
        clients.len()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Send `bytes` to every client, removing those whose send fails
    pub fn broadcast(&self, bytes: &[u8]) -> BroadcastReport {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            return BroadcastReport::default();
        }

        let before = clients.len();
        clients.retain_mut(|client| match client.send(bytes) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping event client: {}", e);
                client.close();
                false
            }
        });

        let delivered = clients.len();
        BroadcastReport {
            delivered,
            dropped: before - delivered,
        }
    }

    /// Remove clients whose peer has disconnected; returns how many
    pub fn reap_disconnected(&self) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();
        clients.retain_mut(|client| {
            if client.is_disconnected() {
                client.close();
                false
            } else {
                true
            }
        });
        before - clients.len()
    }

    /// Close and remove every client; returns how many
    pub fn close_all(&self) -> usize {
        let mut clients = self.clients.lock();
        let count = clients.len();
        for client in clients.iter_mut() {
            client.close();
        }
        clients.clear();
        count
    }
}

impl<C: EventClient> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
