//! Conversion of provider payloads into ordered forecast rows.
//!
//! Each field is collected into its own column and the columns are zipped at
//! the end. A slot missing a field therefore shortens that column only, and
//! rows stop at the end of the shortest column. The provider occasionally
//! omits fields, and this truncation is the established behavior of the bot.

use serde_json::{Map, Value};
use tracing::warn;

use crate::model::{ForecastRow, Payload};

/// Number of leading slots in the two-day bundle that belong to the rest of today.
pub const TOMORROW_OFFSET: usize = 8;

/// Normalize a payload, skipping [`TOMORROW_OFFSET`] slots when `apply_offset` is set.
pub fn normalize(payload: Payload, apply_offset: bool) -> Vec<ForecastRow> {
    let offset = if apply_offset { TOMORROW_OFFSET } else { 0 };
    normalize_with_offset(payload, offset)
}

/// Normalize a payload, skipping the first `offset` slots of a series.
///
/// Snapshots are never offset.
pub fn normalize_with_offset(payload: Payload, offset: usize) -> Vec<ForecastRow> {
    let mut columns = Columns::default();

    match payload {
        Payload::Snapshot(slot) => columns.collect(&slot),
        Payload::Series(slots) => {
            for (index, slot) in slots.iter().enumerate().skip(offset) {
                match slot.as_object() {
                    Some(slot) => columns.collect(slot),
                    None => warn!(index, "Skipping forecast slot that is not an object"),
                }
            }
        }
    }

    columns.into_rows()
}

#[derive(Debug, Default)]
struct Columns {
    time: Vec<String>,
    description: Vec<String>,
    humidity: Vec<f64>,
    pressure: Vec<f64>,
    temperature: Vec<f64>,
    wind_speed: Vec<f64>,
    wind_direction: Vec<i64>,
}

impl Columns {
    fn collect(&mut self, slot: &Map<String, Value>) {
        if let Some(v) = lookup(slot, &["date", "local"]).and_then(Value::as_str) {
            self.time.push(v.to_string());
        }
        if let Some(v) = lookup(slot, &["description", "full"]).and_then(Value::as_str) {
            self.description.push(v.to_string());
        }
        if let Some(v) = lookup(slot, &["humidity", "percent"]).and_then(Value::as_f64) {
            self.humidity.push(v);
        }
        if let Some(v) = lookup(slot, &["pressure", "mm_hg_atm"]).and_then(Value::as_f64) {
            self.pressure.push(v);
        }
        if let Some(v) = lookup(slot, &["temperature", "air", "C"]).and_then(Value::as_f64) {
            self.temperature.push(v);
        }
        if let Some(v) = lookup(slot, &["wind", "speed", "m_s"]).and_then(Value::as_f64) {
            self.wind_speed.push(v);
        }
        if let Some(v) = lookup(slot, &["wind", "direction", "scale_8"]).and_then(Value::as_i64) {
            self.wind_direction.push(v);
        }
    }

    fn into_rows(self) -> Vec<ForecastRow> {
        let lengths = [
            self.time.len(),
            self.description.len(),
            self.humidity.len(),
            self.pressure.len(),
            self.temperature.len(),
            self.wind_speed.len(),
            self.wind_direction.len(),
        ];
        if lengths.iter().any(|&len| len != lengths[0]) {
            warn!(?lengths, "Forecast columns differ in length, trailing slots are dropped");
        }

        let mut time = self.time.into_iter();
        let mut description = self.description.into_iter();
        let mut humidity = self.humidity.into_iter();
        let mut pressure = self.pressure.into_iter();
        let mut temperature = self.temperature.into_iter();
        let mut wind_speed = self.wind_speed.into_iter();
        let mut wind_direction = self.wind_direction.into_iter();

        // Stops at the first exhausted column.
        std::iter::from_fn(|| {
            Some(ForecastRow {
                local_time: time.next()?,
                description: description.next()?,
                humidity_pct: humidity.next()?,
                pressure_mm_hg: pressure.next()?,
                temperature_c: temperature.next()?,
                wind_speed_ms: wind_speed.next()?,
                wind_direction: wind_direction.next()?,
            })
        })
        .collect()
    }
}

fn lookup<'a>(slot: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(slot.get(*first)?, |value, key| value.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(local: &str, temperature: f64) -> Value {
        json!({
            "date": {"local": local, "UTC": local},
            "description": {"full": "Clear"},
            "humidity": {"percent": 55},
            "pressure": {"mm_hg_atm": 750},
            "temperature": {"air": {"C": temperature}, "comfort": {"C": temperature}},
            "wind": {"speed": {"m_s": 3}, "direction": {"scale_8": 1, "degree": 45}},
        })
    }

    fn series(count: usize) -> Payload {
        let slots = (0..count)
            .map(|hour| slot(&format!("2024-05-01T{hour:02}:00"), hour as f64))
            .collect();
        Payload::Series(slots)
    }

    fn snapshot(value: Value) -> Payload {
        Payload::from_value(value).expect("object payload")
    }

    #[test]
    fn snapshot_gives_exactly_one_row() {
        let rows = normalize(snapshot(slot("2024-05-01T09:00", 20.0)), false);

        assert_eq!(
            rows,
            vec![ForecastRow {
                local_time: "2024-05-01T09:00".into(),
                description: "Clear".into(),
                humidity_pct: 55.0,
                pressure_mm_hg: 750.0,
                temperature_c: 20.0,
                wind_speed_ms: 3.0,
                wind_direction: 1,
            }]
        );
    }

    #[test]
    fn snapshot_ignores_offset() {
        assert_eq!(normalize(snapshot(slot("2024-05-01T09:00", 20.0)), true).len(), 1);
    }

    #[test]
    fn series_keeps_every_slot_in_order() {
        let rows = normalize(series(24), false);

        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].local_time, "2024-05-01T00:00");
        assert_eq!(rows[23].local_time, "2024-05-01T23:00");
    }

    #[test]
    fn offset_keeps_last_two_of_ten() {
        let rows = normalize(series(10), true);

        let times: Vec<_> = rows.iter().map(|r| r.local_time.as_str()).collect();
        assert_eq!(times, ["2024-05-01T08:00", "2024-05-01T09:00"]);
    }

    #[test]
    fn offset_on_short_series_gives_nothing() {
        assert!(normalize(series(5), true).is_empty());
        assert!(normalize(series(8), true).is_empty());
    }

    #[test]
    fn custom_offset() {
        assert_eq!(normalize_with_offset(series(10), 3).len(), 7);
    }

    #[test]
    fn empty_inputs_give_no_rows() {
        assert!(normalize(Payload::Series(vec![]), false).is_empty());
        assert!(normalize(Payload::Snapshot(Map::new()), false).is_empty());
    }

    #[test]
    fn missing_field_truncates_trailing_rows() {
        let mut slots: Vec<Value> = (0..3)
            .map(|h| slot(&format!("2024-05-01T0{h}:00"), 10.0))
            .collect();
        if let Some(first) = slots[0].as_object_mut() {
            first.remove("humidity");
        }

        let rows = normalize(Payload::Series(slots), false);

        // humidity column has two entries, so only two rows survive and the
        // first humidity value now pairs with the first timestamp.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].local_time, "2024-05-01T00:00");
        assert_eq!(rows[1].local_time, "2024-05-01T01:00");
    }

    #[test]
    fn non_object_slots_are_skipped() {
        let slots = vec![json!("garbage"), slot("2024-05-01T10:00", 1.0), json!(null)];
        let rows = normalize(Payload::Series(slots), false);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].local_time, "2024-05-01T10:00");
    }

    #[test]
    fn fractional_values_are_kept() {
        let mut value = slot("2024-05-01T09:00", -1.5);
        value["wind"]["speed"]["m_s"] = json!(2.7);

        let rows = normalize(snapshot(value), false);
        assert_eq!(rows[0].temperature_c, -1.5);
        assert_eq!(rows[0].wind_speed_ms, 2.7);
    }
}
