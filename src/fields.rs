use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{ClockError, ClockResult};

/// Placeholder name → literal value, produced fresh per render call.
pub type ResolvedFields = BTreeMap<String, String>;

/// Weather data fetched by an external collaborator and injected here.
/// The resolver itself performs no network I/O.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub condition: String,
    /// OpenWeatherMap icon code, e.g. "01d".
    pub icon_id: String,
}

#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    pub weather: Option<WeatherSnapshot>,
}

/// Compute the dynamic field values for `instant` in `timezone`.
///
/// Pure: the instant is passed explicitly, so the same inputs always resolve
/// to the same fields.
pub fn resolve(
    instant: DateTime<Utc>,
    timezone: &str,
    options: &ResolveOptions,
) -> ClockResult<ResolvedFields> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ClockError::invalid_timezone(timezone.to_string()))?;
    let local = instant.with_timezone(&tz);

    let mut fields = ResolvedFields::new();
    fields.insert("TIME".to_string(), local.format("%H:%M").to_string());
    fields.insert(
        "DATE".to_string(),
        local.format("%A, %B %-d, %Y").to_string(),
    );

    if let Some(weather) = &options.weather {
        fields.insert(
            "TEMP".to_string(),
            format!("{}°C", weather.temperature_c.round() as i64),
        );
        fields.insert("CONDITION".to_string(), weather.condition.clone());
        fields.insert(
            "ICON".to_string(),
            icon_name(&weather.icon_id).to_string(),
        );
    }

    Ok(fields)
}

/// Map an OpenWeatherMap icon code to a local icon name. The trailing
/// day/night suffix is ignored; unknown codes fall back to clear sky.
pub fn icon_name(icon_id: &str) -> &'static str {
    let base = icon_id.trim_end_matches(['d', 'n']);
    match base {
        "01" => "skc",  // clear sky
        "02" => "few",  // few clouds
        "03" => "sct",  // scattered clouds
        "04" => "bkn",  // broken clouds
        "09" => "shra", // shower rain
        "10" => "ra",   // rain
        "11" => "tsra", // thunderstorm
        "13" => "sn",   // snow
        "50" => "fg",   // mist
        _ => "skc",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn tokyo_time_is_converted_from_utc() {
        let instant = Utc.with_ymd_and_hms(2025, 12, 3, 5, 30, 0).unwrap();
        let fields = resolve(instant, "Asia/Tokyo", &ResolveOptions::default()).unwrap();
        assert_eq!(fields["TIME"], "14:30");
    }

    #[test]
    fn date_is_textual_weekday_month_day_year() {
        let instant = Utc.with_ymd_and_hms(2025, 4, 4, 12, 0, 0).unwrap();
        let fields = resolve(instant, "UTC", &ResolveOptions::default()).unwrap();
        assert_eq!(fields["DATE"], "Friday, April 4, 2025");
    }

    #[test]
    fn resolve_is_deterministic() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = resolve(instant, "Europe/Berlin", &ResolveOptions::default()).unwrap();
        let b = resolve(instant, "Europe/Berlin", &ResolveOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let err = resolve(instant, "Mars/Olympus_Mons", &ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, ClockError::InvalidTimezone(_)));
    }

    #[test]
    fn weather_fields_present_only_when_supplied() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let bare = resolve(instant, "UTC", &ResolveOptions::default()).unwrap();
        assert!(!bare.contains_key("TEMP"));

        let options = ResolveOptions {
            weather: Some(WeatherSnapshot {
                temperature_c: 22.6,
                condition: "Clear Sky".to_string(),
                icon_id: "01d".to_string(),
            }),
        };
        let fields = resolve(instant, "UTC", &options).unwrap();
        assert_eq!(fields["TEMP"], "23°C");
        assert_eq!(fields["CONDITION"], "Clear Sky");
        assert_eq!(fields["ICON"], "skc");
    }

    #[test]
    fn icon_mapping_strips_day_night_suffix() {
        assert_eq!(icon_name("10d"), "ra");
        assert_eq!(icon_name("10n"), "ra");
        assert_eq!(icon_name("13"), "sn");
        assert_eq!(icon_name("99x"), "skc");
    }
}
