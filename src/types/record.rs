use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single geotagged report.
///
/// `id`, `user_id` and `timestamp` are assigned by the server on creation and
/// never trusted from client input. Everything else the client submitted —
/// including `lat`/`lng` — lives in `fields` and is stored and served back
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
  pub id: String,
  pub user_id: String,
  pub timestamp: String,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl LocationRecord {
  /// Latitude, when the client supplied a JSON number for it.
  pub fn lat(&self) -> Option<f64> {
    self.fields.get("lat").and_then(Value::as_f64)
  }

  /// Longitude, when the client supplied a JSON number for it.
  pub fn lng(&self) -> Option<f64> {
    self.fields.get("lng").and_then(Value::as_f64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_unknown_fields_round_trip() {
    let raw = json!({
      "id": "abc",
      "user_id": "u1",
      "timestamp": "2026年08月06日 12時00分00秒",
      "lat": 35.68,
      "lng": 139.76,
      "note": "brown bear near the trailhead"
    });

    let record: LocationRecord = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(record.id, "abc");
    assert_eq!(record.user_id, "u1");
    assert_eq!(record.lat(), Some(35.68));
    assert_eq!(record.fields["note"], "brown bear near the trailhead");

    assert_eq!(serde_json::to_value(&record).unwrap(), raw);
  }

  #[test]
  fn test_non_numeric_coordinates_read_as_none() {
    let record: LocationRecord = serde_json::from_value(json!({
      "id": "abc",
      "user_id": "u1",
      "timestamp": "t",
      "lat": "35.68"
    }))
    .unwrap();

    assert_eq!(record.lat(), None);
    assert_eq!(record.lng(), None);
    // The string survives untouched either way.
    assert_eq!(record.fields["lat"], "35.68");
  }
}
