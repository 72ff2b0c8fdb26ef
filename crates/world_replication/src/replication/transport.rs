//! Outbound packet delivery.
//!
//! The core only ever hands finished packets to a [`Transport`]; delivery is
//! fire-and-forget and ordered per observer.

use crate::error::DecodeError;
use crate::types::ObjectGuid;
use crate::update::{decode_packet, DecodedPacket};
use bytes::Bytes;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Sink for serialized packets addressed to one observer's client.
pub trait Transport: Send + Sync + Debug {
    fn send(&self, observer: ObjectGuid, packet: Bytes);
}

/// Delivers packets to per-session channels.
///
/// Each connected client registers once and drains its receiver from its
/// own I/O task. Packets for observers without a session are dropped.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    sessions: DashMap<ObjectGuid, mpsc::UnboundedSender<Bytes>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session for `observer`, replacing any previous one.
    pub fn register(&self, observer: ObjectGuid) -> mpsc::UnboundedReceiver<Bytes> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.sessions.insert(observer, sender).is_some() {
            debug!(%observer, "Replaced existing session");
        }
        receiver
    }

    pub fn unregister(&self, observer: ObjectGuid) -> bool {
        self.sessions.remove(&observer).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, observer: ObjectGuid, packet: Bytes) {
        let closed = match self.sessions.get(&observer) {
            Some(session) => session.send(packet).is_err(),
            None => {
                trace!(%observer, "No session for observer, dropping packet");
                return;
            }
        };
        if closed {
            debug!(%observer, "Session receiver dropped, closing session");
            self.sessions.remove(&observer);
        }
    }
}

/// Keeps every packet in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    packets: Mutex<Vec<(ObjectGuid, Bytes)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far, in send order.
    pub fn take(&self) -> Vec<(ObjectGuid, Bytes)> {
        let mut packets = self.packets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *packets)
    }

    /// Removes the packets of `observer` and decodes them.
    pub fn take_decoded(&self, observer: ObjectGuid) -> Result<Vec<DecodedPacket>, DecodeError> {
        let mut packets = self.packets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (mine, others): (Vec<_>, Vec<_>) = std::mem::take(&mut *packets)
            .into_iter()
            .partition(|(receiver, _)| *receiver == observer);
        *packets = others;
        mine.into_iter().map(|(_, packet)| decode_packet(packet)).collect()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().map(|packets| packets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for RecordingTransport {
    fn send(&self, observer: ObjectGuid, packet: Bytes) {
        let mut packets = self.packets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        packets.push((observer, packet));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_routes_by_observer() {
        let transport = ChannelTransport::new();
        let alice = ObjectGuid::player(1);
        let bob = ObjectGuid::player(2);
        let mut alice_rx = transport.register(alice);

        transport.send(alice, Bytes::from_static(b"one"));
        transport.send(bob, Bytes::from_static(b"lost"));
        transport.send(alice, Bytes::from_static(b"two"));

        assert_eq!(alice_rx.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(alice_rx.recv().await.unwrap(), Bytes::from_static(b"two"));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receiver_closes_the_session() {
        let transport = ChannelTransport::new();
        let alice = ObjectGuid::player(1);
        drop(transport.register(alice));
        assert_eq!(transport.session_count(), 1);

        transport.send(alice, Bytes::from_static(b"gone"));
        assert_eq!(transport.session_count(), 0);
    }

    #[test]
    fn recording_transport_keeps_send_order() {
        let transport = RecordingTransport::new();
        transport.send(ObjectGuid::player(1), Bytes::from_static(b"a"));
        transport.send(ObjectGuid::player(2), Bytes::from_static(b"b"));
        assert_eq!(transport.len(), 2);

        let packets = transport.take();
        assert_eq!(packets[0].0, ObjectGuid::player(1));
        assert!(transport.is_empty());
    }
}
