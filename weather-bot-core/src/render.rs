//! Human-readable forecast messages.

use tracing::error;

use crate::error::RenderError;
use crate::model::ForecastRow;

/// Compass names for the provider's 8-point scale, code 0 meaning calm.
pub const WIND_DIRECTIONS: [&str; 9] = [
    "Calm",
    "North",
    "Northeast",
    "East",
    "Southeast",
    "South",
    "Southwest",
    "West",
    "Northwest",
];

const DATE_LEN: usize = 10;
const TIME_START: usize = 11;
const TIME_LEN: usize = 5;

pub fn wind_direction_name(code: i64) -> Result<&'static str, RenderError> {
    usize::try_from(code)
        .ok()
        .and_then(|index| WIND_DIRECTIONS.get(index).copied())
        .ok_or(RenderError::Lookup(code))
}

/// Render rows as a single message: a date header followed by one line per slot.
pub fn render(rows: &[ForecastRow]) -> Result<String, RenderError> {
    let first = rows.first().ok_or(RenderError::EmptyForecast)?;

    let date: String = first.local_time.chars().take(DATE_LEN).collect();
    let mut message = format!("Weather for {date}:\n");

    for row in rows {
        let wind = wind_direction_name(row.wind_direction).inspect_err(|err| {
            error!(time = %row.local_time, "Provider sent a bad wind direction: {err}");
        })?;
        let time: String = row
            .local_time
            .chars()
            .skip(TIME_START)
            .take(TIME_LEN)
            .collect();

        message.push_str(&format!(
            "{time}: Air temperature will be {}°C. Humidity: {}%. Pressure: {} mmHg. \
             Wind: {wind}, {} m/s, {}.\n\n",
            row.temperature_c,
            row.humidity_pct,
            row.pressure_mm_hg,
            row.wind_speed_ms,
            row.description,
        ));
    }

    Ok(message)
}
