//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::coordinator::{Broadcaster, Coordinator, CoordinatorHandle};
use crate::protocol::ServerMessage;
use crate::registry::{ClientId, Snapshot};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 열린 연결의 송신 큐 (client_id -> PeerSession)
    pub peers: Arc<Peers>,
    /// 세션 레지스트리를 소유한 코디네이터로의 이벤트 큐
    pub coordinator: CoordinatorHandle,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    /// 코디네이터 태스크를 함께 띄운다. tokio 런타임 안에서 호출해야 한다
    pub fn new(config: Config) -> Self {
        let peers = Arc::new(Peers::default());
        let coordinator = Coordinator::spawn(peers.clone());
        Self {
            peers,
            coordinator,
            config: Arc::new(config),
        }
    }
}

/// 피어 세션 정보
pub struct PeerSession {
    pub sender: UnboundedSender<ServerMessage>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}

impl PeerSession {
    pub fn new(sender: UnboundedSender<ServerMessage>) -> Self {
        Self {
            sender,
            connected_at: Instant::now(),
        }
    }
}

/// 전송 계층 쪽 연결 테이블
#[derive(Default)]
pub struct Peers {
    sessions: DashMap<ClientId, PeerSession>,
}

impl Peers {
    pub fn insert(&self, id: ClientId, session: PeerSession) {
        self.sessions.insert(id, session);
    }

    pub fn remove(&self, id: &ClientId) -> Option<PeerSession> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 한 피어에게 전송. 큐가 닫혔으면 false
    pub fn send_to(&self, id: &ClientId, message: ServerMessage) -> bool {
        self.sessions
            .get(id)
            .map(|session| session.sender.send(message).is_ok())
            .unwrap_or(false)
    }
}

impl Broadcaster for Peers {
    fn broadcast(&self, snapshot: &Snapshot) {
        let mut delivered = 0usize;
        for entry in self.sessions.iter() {
            // 닫힌 큐는 건너뛴다. 정리는 해당 연결의 disconnect가 맡는다
            match entry.sender.send(ServerMessage::ReceiveLocation(snapshot.clone())) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::debug!(client_id = %entry.key(), "Broadcast to closed peer skipped")
                }
            }
        }
        tracing::debug!(
            entries = snapshot.len(),
            recipients = delivered,
            "Broadcast receiveLocation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use tokio::sync::mpsc;

    fn snapshot_of(ids: &[&str]) -> Snapshot {
        let mut registry = Registry::new();
        for id in ids {
            registry.register((*id).into()).unwrap();
        }
        registry.snapshot()
    }

    #[test]
    fn test_broadcast_reaches_every_peer() {
        let peers = Peers::default();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        peers.insert("A".into(), PeerSession::new(tx_a));
        peers.insert("B".into(), PeerSession::new(tx_b));

        let snapshot = snapshot_of(&["A", "B"]);
        peers.broadcast(&snapshot);

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv().unwrap() {
                ServerMessage::ReceiveLocation(received) => assert_eq!(received, snapshot),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_closed_peer_does_not_block_others() {
        let peers = Peers::default();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        peers.insert("A".into(), PeerSession::new(tx_a));
        peers.insert("B".into(), PeerSession::new(tx_b));
        drop(rx_a);

        peers.broadcast(&snapshot_of(&["A", "B"]));

        assert!(matches!(
            rx_b.try_recv(),
            Ok(ServerMessage::ReceiveLocation(_))
        ));
        assert!(!peers.send_to(&"A".into(), ServerMessage::HeartbeatAck));
        assert!(peers.send_to(&"B".into(), ServerMessage::HeartbeatAck));
    }

    #[test]
    fn test_removed_peer_receives_nothing() {
        let peers = Peers::default();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        peers.insert("A".into(), PeerSession::new(tx_a));

        assert!(peers.remove(&"A".into()).is_some());
        assert!(peers.remove(&"A".into()).is_none());
        peers.broadcast(&snapshot_of(&[]));

        assert_eq!(peers.len(), 0);
        assert!(rx_a.try_recv().is_err());
    }
}
