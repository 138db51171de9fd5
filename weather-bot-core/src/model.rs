use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Stored location of a single chat user.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRecord {
    pub user_id: i64,
    pub coordinates: Coordinates,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which forecast the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastKind {
    Current,
    Today,
    Tomorrow,
}

impl ForecastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastKind::Current => "current",
            ForecastKind::Today => "today",
            ForecastKind::Tomorrow => "tomorrow",
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            ForecastKind::Current => Endpoint::Current,
            ForecastKind::Today => Endpoint::Forecast,
            ForecastKind::Tomorrow => Endpoint::ForecastAggregate,
        }
    }

    /// Value of the `days` query parameter, if any.
    pub fn days(&self) -> Option<u8> {
        match self {
            ForecastKind::Current => None,
            ForecastKind::Today => Some(1),
            ForecastKind::Tomorrow => Some(2),
        }
    }

    /// The two-day bundle starts with the rest of today, which has to be skipped.
    pub fn applies_offset(&self) -> bool {
        matches!(self, ForecastKind::Tomorrow)
    }
}

impl std::fmt::Display for ForecastKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ForecastKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "current" => Ok(ForecastKind::Current),
            "today" => Ok(ForecastKind::Today),
            "tomorrow" => Ok(ForecastKind::Tomorrow),
            _ => Err(anyhow::anyhow!(
                "Unknown forecast '{value}'. Supported forecasts: current, today, tomorrow."
            )),
        }
    }
}

/// Provider resource a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Current,
    Forecast,
    ForecastAggregate,
}

#[derive(Debug, Clone)]
pub struct WeatherRequest {
    pub endpoint: Endpoint,
    pub coordinates: Coordinates,
    pub days: Option<u8>,
}

impl WeatherRequest {
    pub fn for_kind(kind: ForecastKind, coordinates: Coordinates) -> Self {
        Self {
            endpoint: kind.endpoint(),
            coordinates,
            days: kind.days(),
        }
    }
}

/// Decoded `response` field of a provider reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Current conditions: one object.
    Snapshot(Map<String, Value>),
    /// Forecast: one object per time slot, oldest first.
    Series(Vec<Value>),
}

impl Payload {
    /// Returns `None` when the value is neither an object nor an array.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Payload::Snapshot(map)),
            Value::Array(items) => Some(Payload::Series(items)),
            _ => None,
        }
    }
}

/// One normalized time slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub local_time: String,
    pub description: String,
    pub humidity_pct: f64,
    pub pressure_mm_hg: f64,
    pub temperature_c: f64,
    pub wind_speed_ms: f64,
    pub wind_direction: i64,
}
