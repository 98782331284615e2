use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::{EntityId, RaterId, RatingValue};

const RATING_EVENT: &str = "rating";
const FIELD_COUNT: usize = 5;

/// One `rating` action pulled out of the raw logs, before partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredEvent {
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: Option<RaterId>,
    #[serde(rename = "movieId")]
    pub movie_id: Option<EntityId>,
    pub rating: Option<RatingValue>,
    pub prediction: Option<RatingValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Rating(FilteredEvent),
    OtherEvent,
    Malformed(String),
}

/// Parse one `timestamp \t userId \t sessionId \t eventType \t metadata` log line.
pub fn parse_log_line(line: &str) -> LineOutcome {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    if fields.len() < FIELD_COUNT {
        return LineOutcome::Malformed(format!("expected {} fields, got {}", FIELD_COUNT, fields.len()));
    }

    let (timestamp, user_id, event_type, metadata) = (fields[0], fields[1], fields[3], fields[4]);
    if event_type != RATING_EVENT {
        return LineOutcome::OtherEvent;
    }

    let metadata: Value = match serde_json::from_str(metadata) {
        Ok(value) => value,
        Err(e) => return LineOutcome::Malformed(format!("invalid metadata JSON: {}", e)),
    };

    let Some(timestamp) = parse_timestamp(timestamp) else {
        return LineOutcome::Malformed(format!("unparsable timestamp '{}'", timestamp));
    };

    LineOutcome::Rating(FilteredEvent {
        timestamp,
        user_id: user_id.trim().parse().ok(),
        movie_id: metadata.get("movieId").and_then(as_i64),
        rating: metadata.get("rating").and_then(as_f64),
        prediction: metadata.get("pred").and_then(as_f64),
    })
}

/// Unix seconds from an integer, fractional, RFC 3339 or naive UTC timestamp.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<i64>() {
        return Some(seconds);
    }

    if let Ok(seconds) = raw.parse::<f64>() {
        if seconds.is_finite() {
            return Some(seconds.floor() as i64);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| dt.and_utc().timestamp())
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|v: &f64| v.is_finite()),
        _ => None,
    }
}
