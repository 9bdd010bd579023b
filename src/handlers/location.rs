//! 위치 보고 핸들러

use crate::location::LocationReport;
use crate::registry::ClientId;
use crate::state::AppState;
use std::sync::Arc;

/// sendLocation 처리. 검증과 브로드캐스트는 코디네이터가 한다
pub fn handle_send_location(state: &Arc<AppState>, client_id: &ClientId, report: LocationReport) {
    tracing::trace!(client_id = %client_id, report = ?report, "sendLocation queued");
    state.coordinator.report(client_id.clone(), report);
}
