//! 브로드캐스트 코디네이터
//!
//! 전송 계층의 connect / sendLocation / disconnect 이벤트를 하나의 큐로 모아
//! 단일 태스크가 순서대로 처리한다. 레지스트리 변경과 그에 따른 스냅샷 생성은
//! 이 태스크 안에서만 일어나므로 이벤트끼리 섞이지 않는다.

use crate::location::{Location, LocationReport};
use crate::registry::{ClientId, Registry, Snapshot};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// 스냅샷을 모든 연결에 뿌리는 전송 측 경계.
///
/// 구현은 수신자별 실패를 스스로 격리해야 하며 블로킹하면 안 된다.
pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(&self, snapshot: &Snapshot);
}

/// 전송 계층에서 들어오는 이벤트
#[derive(Debug, Clone)]
pub enum Event {
    Connect(ClientId),
    Report(ClientId, LocationReport),
    Disconnect(ClientId),
}

/// 이벤트 하나를 처리한 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 레지스트리만 바뀌고 알림 없음 (connect)
    Silent,
    /// 이 스냅샷을 브로드캐스트함
    Broadcast(Snapshot),
    /// 이벤트를 버림. 레지스트리 변화 없음
    Discarded,
}

pub struct Coordinator {
    registry: Registry,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Coordinator {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            registry: Registry::new(),
            broadcaster,
        }
    }

    /// 코디네이터 태스크를 띄우고 이벤트 큐 핸들을 반환
    pub fn spawn(broadcaster: Arc<dyn Broadcaster>) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self::new(broadcaster);
        tokio::spawn(coordinator.run(rx));
        CoordinatorHandle { tx }
    }

    /// 모든 핸들이 drop될 때까지 큐를 비운다
    pub async fn run(mut self, mut rx: UnboundedReceiver<Event>) {
        tracing::debug!("Coordinator started");
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        tracing::debug!(sessions = self.registry.len(), "Coordinator stopped");
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 이벤트 하나를 적용하고, 필요하면 브로드캐스트까지 마친다
    pub fn handle(&mut self, event: Event) -> Outcome {
        match event {
            Event::Connect(id) => self.on_connect(id),
            Event::Report(id, report) => self.on_report(&id, &report),
            Event::Disconnect(id) => self.on_disconnect(&id),
        }
    }

    fn on_connect(&mut self, id: ClientId) -> Outcome {
        match self.registry.register(id.clone()) {
            Ok(()) => {
                tracing::info!(client_id = %id, sessions = self.registry.len(), "User connected");
                Outcome::Silent
            }
            Err(e) => {
                tracing::warn!(client_id = %id, error = %e, "Duplicate connect ignored");
                Outcome::Discarded
            }
        }
    }

    fn on_report(&mut self, id: &ClientId, report: &LocationReport) -> Outcome {
        let location = match Location::try_from(report) {
            Ok(location) => location,
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "Malformed location discarded");
                return Outcome::Discarded;
            }
        };

        if let Err(e) = self.registry.report_location(id, location) {
            tracing::warn!(client_id = %id, error = %e, "Location report discarded");
            return Outcome::Discarded;
        }

        tracing::debug!(
            client_id = %id,
            latitude = location.latitude,
            longitude = location.longitude,
            "Location received"
        );
        self.broadcast()
    }

    fn on_disconnect(&mut self, id: &ClientId) -> Outcome {
        if self.registry.remove(id) {
            tracing::info!(client_id = %id, sessions = self.registry.len(), "User disconnected");
        } else {
            tracing::debug!(client_id = %id, "Disconnect for absent session");
        }
        self.broadcast()
    }

    fn broadcast(&self) -> Outcome {
        let snapshot = self.registry.snapshot();
        self.broadcaster.broadcast(&snapshot);
        Outcome::Broadcast(snapshot)
    }
}

/// 코디네이터 큐에 이벤트를 넣는 핸들. 복제해서 연결마다 나눠 쓴다
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: UnboundedSender<Event>,
}

impl CoordinatorHandle {
    pub fn connect(&self, id: ClientId) {
        self.submit(Event::Connect(id));
    }

    pub fn report(&self, id: ClientId, report: LocationReport) {
        self.submit(Event::Report(id, report));
    }

    pub fn disconnect(&self, id: ClientId) {
        self.submit(Event::Disconnect(id));
    }

    fn submit(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::error!(event = ?e.0, "Coordinator is not running, event dropped");
        }
    }
}
