//! Wire shape of the station's JSON document.
//!
//! Every field defaults to zero when the station omits it, and unknown keys
//! are ignored. An empty object is a valid (all-zero) reading.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StationReading {
    pub battery: f64,
    pub uv: UvReading,
    pub wind: WindReading,
    pub thp: ThpReading,
    pub rain: RainReading,
    pub lightning: LightningReading,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UvReading {
    pub a: f64,
    pub b: f64,
    pub index: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindReading {
    pub speed: f64,
    pub direction: f64,
    pub speed2_minute_average: f64,
    pub direction2_minute_average: f64,
    pub gust_ten_minute_max_speed: f64,
    /// The station firmware spells this key `gustTenMinueMaxDirection`.
    #[serde(
        rename = "gustTenMinueMaxDirection",
        alias = "gustTenMinuteMaxDirection"
    )]
    pub gust_ten_minute_max_direction: f64,
    pub max_daily_gust: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThpReading {
    #[serde(rename = "tempC")]
    pub temp_c: f64,
    #[serde(rename = "tempF")]
    pub temp_f: f64,
    pub humidity: f64,
    pub pressure: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RainReading {
    pub hour: f64,
    pub daily: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightningReading {
    pub strike: bool,
    pub distance: i64,
}
