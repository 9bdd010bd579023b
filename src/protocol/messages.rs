//! 클라이언트-허브 메시지 프로토콜 정의

use crate::location::LocationReport;
use crate::registry::{ClientId, Snapshot};
use serde::{Deserialize, Serialize};

/// 클라이언트 → 허브 메시지
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    // Connection
    Heartbeat,

    // Location
    SendLocation(LocationReport),
}

/// 허브 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    // Connection
    Connected { id: ClientId },
    HeartbeatAck,

    // Location
    ReceiveLocation(Snapshot),
}
