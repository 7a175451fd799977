//! Telemetry record model shared by the ingestion pipeline, the record
//! stores, and the real-time fan-out path.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accelerometer reading along three axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// An incoming telemetry item as received over the wire.
///
/// The timestamp stays a raw string at this stage; [`NewRecord::into_draft`]
/// validates it, so one malformed item rejects only itself and not the JSON
/// framing of the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub agent_id: i32,
    pub road_state: String,
    pub motion: Motion,
    pub position: Position,
    pub timestamp: String,
}

/// A validated record, ready for a store write. Identical to
/// [`ProcessedRecord`] minus the store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub agent_id: i32,
    pub road_state: String,
    pub motion: Motion,
    pub position: Position,
    pub timestamp: NaiveDateTime,
}

/// The unit of storage and the unit broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: i32,
    pub agent_id: i32,
    pub road_state: String,
    pub motion: Motion,
    pub position: Position,
    pub timestamp: NaiveDateTime,
}

/// Rejection reasons detected before any write happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid timestamp {raw:?}, expected ISO-8601 (e.g. 2024-01-01T12:00:00)")]
    Timestamp { raw: String },
}

/// Parses an ISO-8601 timestamp.
///
/// Accepts offset-carrying RFC 3339 strings (normalized to UTC) as well as
/// naive `YYYY-MM-DDTHH:MM:SS[.f]` strings.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    raw.parse::<NaiveDateTime>().map_err(|_| ValidationError::Timestamp {
        raw: raw.to_string(),
    })
}

impl NewRecord {
    /// Validates the raw item into a storable draft.
    pub fn into_draft(self) -> Result<RecordDraft, ValidationError> {
        let timestamp = parse_timestamp(&self.timestamp)?;
        Ok(RecordDraft {
            agent_id: self.agent_id,
            road_state: self.road_state,
            motion: self.motion,
            position: self.position,
            timestamp,
        })
    }
}

impl ProcessedRecord {
    /// Combines a store-assigned id with the draft it was written from.
    pub fn from_draft(id: i32, draft: &RecordDraft) -> Self {
        Self {
            id,
            agent_id: draft.agent_id,
            road_state: draft.road_state.clone(),
            motion: draft.motion,
            position: draft.position,
            timestamp: draft.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    #[test]
    fn parses_naive_iso8601() {
        let ts = parse_timestamp("2024-01-01T12:00:00").unwrap();
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_rfc3339_and_normalizes_to_utc() {
        let ts = parse_timestamp("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = parse_timestamp("not-a-date").unwrap_err();
        assert_eq!(err, ValidationError::Timestamp { raw: "not-a-date".into() });
    }

    #[test]
    fn wire_shape_round_trips() {
        let raw = r#"{
            "agent_id": 7,
            "road_state": "dry",
            "motion": {"x": 1.0, "y": 2.0, "z": 3.0},
            "position": {"latitude": 10.5, "longitude": 20.5},
            "timestamp": "2024-01-01T00:00:00"
        }"#;
        let item: NewRecord = serde_json::from_str(raw).unwrap();
        let draft = item.into_draft().unwrap();
        let record = ProcessedRecord::from_draft(1, &draft);

        let out: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(out["id"], 1);
        assert_eq!(out["agent_id"], 7);
        assert_eq!(out["road_state"], "dry");
        assert_eq!(out["motion"]["z"], 3.0);
        assert_eq!(out["position"]["latitude"], 10.5);
        assert_eq!(out["timestamp"], "2024-01-01T00:00:00");
    }
}
