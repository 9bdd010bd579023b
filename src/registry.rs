//! 세션 레지스트리
//!
//! 연결된 클라이언트 ID → 마지막으로 보고된 위치. 코디네이터 태스크만 소유하며
//! 외부에서는 아래 연산으로만 접근한다.

use crate::location::Location;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 전송 계층이 연결마다 부여하는 불투명 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// 새 연결용 ID 생성 (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 레지스트리 연산 오류
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("session already registered: {0}")]
    DuplicateSession(ClientId),
    #[error("unknown session: {0}")]
    UnknownSession(ClientId),
}

/// 세션 하나. `seq`는 등록 순서
#[derive(Debug, Clone)]
struct Session {
    seq: u64,
    location: Option<Location>,
}

/// 스냅샷 원소: 위치를 모르면 위도/경도 필드를 생략한다
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub id: ClientId,
    #[serde(flatten)]
    pub location: Option<Location>,
}

/// 특정 시점의 레지스트리 복사본 (등록 순)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Arc<[SnapshotEntry]>,
}

impl Snapshot {
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<ClientId, Session>,
    next_seq: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 위치 없는 세션 추가. 이미 있으면 기존 세션을 유지하고 실패
    pub fn register(&mut self, id: ClientId) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.sessions.insert(
            id,
            Session {
                seq,
                location: None,
            },
        );
        Ok(())
    }

    /// 등록된 세션의 위치 갱신
    pub fn report_location(&mut self, id: &ClientId, location: Location) -> Result<(), RegistryError> {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.location = Some(location);
                Ok(())
            }
            None => Err(RegistryError::UnknownSession(id.clone())),
        }
    }

    /// 세션 삭제. 없는 ID는 무시 (중복 disconnect 허용). 실제로 삭제했으면 true
    pub fn remove(&mut self, id: &ClientId) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut sessions: Vec<(&ClientId, &Session)> = self.sessions.iter().collect();
        sessions.sort_by_key(|(_, session)| session.seq);

        let entries: Vec<SnapshotEntry> = sessions
            .into_iter()
            .map(|(id, session)| SnapshotEntry {
                id: id.clone(),
                location: session.location,
            })
            .collect();

        Snapshot {
            entries: entries.into(),
        }
    }
}
