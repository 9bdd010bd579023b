//! 위치 값 타입과 페이로드 검증

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 위도/경도 쌍
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// 잘못된 위치 보고 (MalformedLocationError)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` is not a number")]
    NonNumeric(&'static str),
    #[error("field `{0}` is not finite")]
    NonFinite(&'static str),
    #[error("field `{field}` out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

impl Location {
    pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
    pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

    /// 범위 검증 후 생성
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        let latitude = check_coordinate("latitude", latitude, &Self::LATITUDE_RANGE)?;
        let longitude = check_coordinate("longitude", longitude, &Self::LONGITUDE_RANGE)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

fn check_coordinate(
    field: &'static str,
    value: f64,
    range: &std::ops::RangeInclusive<f64>,
) -> Result<f64, LocationError> {
    if !value.is_finite() {
        return Err(LocationError::NonFinite(field));
    }
    if !range.contains(&value) {
        return Err(LocationError::OutOfRange { field, value });
    }
    Ok(value)
}

/// 클라이언트가 보낸 그대로의 `sendLocation` 페이로드.
///
/// 필드 형태는 아직 신뢰하지 않는다. 코디네이터가 [`Location`]으로 변환하며 검증한다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
}

impl LocationReport {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(Value::from(latitude)),
            longitude: Some(Value::from(longitude)),
        }
    }
}

fn number_field(field: &'static str, value: Option<&Value>) -> Result<f64, LocationError> {
    match value {
        None | Some(Value::Null) => Err(LocationError::Missing(field)),
        Some(Value::Number(n)) => n.as_f64().ok_or(LocationError::NonNumeric(field)),
        Some(_) => Err(LocationError::NonNumeric(field)),
    }
}

impl TryFrom<&LocationReport> for Location {
    type Error = LocationError;

    fn try_from(report: &LocationReport) -> Result<Self, Self::Error> {
        let latitude = number_field("latitude", report.latitude.as_ref())?;
        let longitude = number_field("longitude", report.longitude.as_ref())?;
        Location::new(latitude, longitude)
    }
}
