//! 환경 변수 기반 설정 관리

use std::env;

pub const DEFAULT_PORT: u16 = 3000;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// 허용 Origin 목록. `*` 하나면 전체 허용
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 key → value 조회 함수로 설정 구성
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_PORT),
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            cors_origins: lookup("CORS_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3001".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
