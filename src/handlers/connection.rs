//! 연결 핸들러

use crate::protocol::ServerMessage;
use crate::registry::ClientId;
use crate::state::{AppState, PeerSession};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// 새 연결 처리
///
/// 송신 큐를 먼저 피어 테이블에 넣고 나서 connect 이벤트를 큐에 넣는다.
/// 접속 자체로는 브로드캐스트하지 않으며, 새 연결에게만 자신의 ID를 알려준다.
pub fn handle_connection(state: &Arc<AppState>, sender: UnboundedSender<ServerMessage>) -> ClientId {
    let client_id = ClientId::generate();

    state
        .peers
        .insert(client_id.clone(), PeerSession::new(sender));

    state.peers.send_to(
        &client_id,
        ServerMessage::Connected {
            id: client_id.clone(),
        },
    );

    state.coordinator.connect(client_id.clone());

    tracing::debug!(client_id = %client_id, "New connection established");
    client_id
}

/// 연결 해제 처리
///
/// 피어 테이블에서 먼저 빼므로 disconnect 브로드캐스트는 남은 연결에게만 간다.
pub fn handle_disconnect(state: &Arc<AppState>, client_id: &ClientId) {
    state.peers.remove(client_id);
    state.coordinator.disconnect(client_id.clone());
    tracing::debug!(client_id = %client_id, "Connection closed");
}

/// Heartbeat 처리
pub fn handle_heartbeat(sender: &UnboundedSender<ServerMessage>) {
    let _ = sender.send(ServerMessage::HeartbeatAck);
}
