//! Maps a coordinate pair to a human-readable local timestamp.

use std::sync::OnceLock;

use chrono::Utc;
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

/// Zone used whenever a coordinate pair does not resolve to a known zone.
pub const FALLBACK_ZONE: Tz = chrono_tz::Asia::Tokyo;

/// Date + time to the second, Japanese locale.
const DISPLAY_FORMAT: &str = "%Y年%m月%d日 %H時%M分%S秒";

fn finder() -> &'static DefaultFinder {
  static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
  FINDER.get_or_init(DefaultFinder::new)
}

/// Time zone for a coordinate pair, falling back to [`FALLBACK_ZONE`] when
/// either coordinate is missing or the lookup yields no known zone.
pub fn zone_for(lat: Option<f64>, lng: Option<f64>) -> Tz {
  let Some((lat, lng)) = lat.zip(lng) else {
    return FALLBACK_ZONE;
  };
  // The finder answers with an empty string for points outside every
  // polygon; a name chrono-tz does not know fails the parse and takes the
  // same fallback path.
  finder().get_tz_name(lng, lat).parse().unwrap_or(FALLBACK_ZONE)
}

/// Current instant formatted in the local zone of the given coordinates.
/// Never fails: every lookup miss formats in the fallback zone instead.
pub fn local_timestamp(lat: Option<f64>, lng: Option<f64>) -> String {
  Utc::now()
    .with_timezone(&zone_for(lat, lng))
    .format(DISPLAY_FORMAT)
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_known_coordinates_resolve() {
    assert_eq!(zone_for(Some(35.68), Some(139.76)), chrono_tz::Asia::Tokyo);
    assert_eq!(
      zone_for(Some(40.71), Some(-74.0)),
      chrono_tz::America::New_York
    );
  }

  #[test]
  fn test_missing_coordinates_fall_back() {
    assert_eq!(zone_for(None, None), FALLBACK_ZONE);
    assert_eq!(zone_for(Some(35.68), None), FALLBACK_ZONE);
    assert_eq!(zone_for(None, Some(139.76)), FALLBACK_ZONE);
  }

  #[test]
  fn test_timestamp_shape() {
    let pattern =
      regex::Regex::new(r"^\d{4}年\d{2}月\d{2}日 \d{2}時\d{2}分\d{2}秒$").unwrap();
    assert!(pattern.is_match(&local_timestamp(Some(35.68), Some(139.76))));
    assert!(pattern.is_match(&local_timestamp(None, None)));
  }
}
