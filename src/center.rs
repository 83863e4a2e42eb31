//! Service-center records as delivered by the backend directory, and the
//! resolved view model produced by one discovery pass.

use crate::geo::GeoPoint;
use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Day names indexed by `num_days_from_sunday()`.
pub const DAY_NAMES: [&str; 7] = [
    "sunday", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday",
];

pub fn day_name(day: Weekday) -> &'static str {
    DAY_NAMES[day.num_days_from_sunday() as usize]
}

/// Opening hours for a single day. Either bound missing means closed.
///
/// A bound of any type other than a string decodes as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(default, deserialize_with = "text_or_none")]
    pub open: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub close: Option<String>,
}

impl DayHours {
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: Some(open.to_string()),
            close: Some(close.to_string()),
        }
    }
}

/// Weekly opening hours keyed by day name.
///
/// Keys are matched case-insensitively and may be either full English day
/// names ("monday") or three-letter abbreviations ("mon"). An entry that is
/// not an hours object decodes as `None`, i.e. closed that day; a schedule
/// that is not an object at all decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WeeklySchedule(BTreeMap<String, Option<DayHours>>);

impl<'de> Deserialize<'de> for WeeklySchedule {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let Value::Object(raw) = Value::deserialize(de)? else {
            return Ok(Self::default());
        };
        let days = raw
            .into_iter()
            .map(|(day, entry)| {
                let hours = match entry {
                    Value::Null => None,
                    other => serde_json::from_value::<DayHours>(other.clone())
                        .map_err(|e| tracing::debug!(%day, entry = %other, error = %e, "malformed schedule entry"))
                        .ok(),
                };
                (day, hours)
            })
            .collect();
        Ok(Self(days))
    }
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with_day(mut self, day: Weekday, hours: DayHours) -> Self {
        self.0.insert(day_name(day).to_string(), Some(hours));
        self
    }

    /// Hours entry for `day`, if the schedule has a non-null entry for it.
    pub fn day(&self, day: Weekday) -> Option<&DayHours> {
        let full = day_name(day);
        let short = &full[..3];
        self.0
            .iter()
            .find(|(key, _)| {
                let key = key.trim().to_lowercase();
                key == full || key == short
            })
            .and_then(|(_, hours)| hours.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A service center as stored by the backend directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCenter {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lon", deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    /// Server-computed distance from the query point. Never negative.
    #[serde(default, alias = "distance", deserialize_with = "server_distance", skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, alias = "openingHours")]
    pub schedule: WeeklySchedule,
    #[serde(default = "default_active", deserialize_with = "active_flag")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl ServiceCenter {
    /// Own coordinates, when both components are present and valid.
    pub fn coordinates(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => GeoPoint::checked(lat, lng),
            _ => None,
        }
    }
}

/// Where a resolved distance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceSource {
    Server,
    Coordinates,
    Geocoded,
    Unknown,
}

impl fmt::Display for DistanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Coordinates => write!(f, "coordinates"),
            Self::Geocoded => write!(f, "geocoded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Today's opening window as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub open: String,
    pub close: String,
}

/// A center annotated with distance and availability for one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCenter {
    #[serde(flatten)]
    pub center: ServiceCenter,
    pub resolved_distance_km: Option<f64>,
    pub distance_source: DistanceSource,
    pub is_open_now: bool,
    pub today_window: Option<TimeWindow>,
    /// Whether the center may be picked on a booking surface.
    pub selectable: bool,
}

// ─── Lenient wire decoding ──────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Number(f64),
    Text(String),
}

fn id_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match NumberOrString::deserialize(de)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::Int(n) => n.to_string(),
        NumberOrString::Text(s) => s,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let raw: Option<NumberOrString> = Option::deserialize(de)?;
    Ok(match raw {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Int(n)) => Some(n as f64),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        None => None,
    }
    .filter(|v: &f64| v.is_finite()))
}

fn text_or_none<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn text_or_empty<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Missing, null or unreadable means active.
fn active_flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "false" | "0" | "inactive"),
        _ => true,
    })
}

fn server_distance<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Ok(lenient_f64(de)?.filter(|d| *d >= 0.0))
}
