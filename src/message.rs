//! Outbound message shapes and the projection from a station reading.

use crate::error::PublishError;
use crate::reading::StationReading;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageShape {
    Wind,
    Rain,
    Thermal,
    Unified,
}

impl MessageShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageShape::Wind => "wind",
            MessageShape::Rain => "rain",
            MessageShape::Thermal => "thermal",
            MessageShape::Unified => "unified",
        }
    }
}

/// Whole-number readings are written without a fractional part
/// (`55`, not `55.0`), matching what downstream consumers already receive.
fn compact_float<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindMessage {
    #[serde(serialize_with = "compact_float")]
    pub speed: f64,
    #[serde(serialize_with = "compact_float")]
    pub direction: f64,
    #[serde(rename = "2mavg", serialize_with = "compact_float")]
    pub speed_2m_avg: f64,
    #[serde(rename = "2mdavg", serialize_with = "compact_float")]
    pub direction_2m_avg: f64,
    #[serde(rename = "10mgust", serialize_with = "compact_float")]
    pub gust_10m_speed: f64,
    #[serde(rename = "10mgdir", serialize_with = "compact_float")]
    pub gust_10m_direction: f64,
    #[serde(rename = "dailyGustMax", serialize_with = "compact_float")]
    pub daily_gust_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainMessage {
    #[serde(serialize_with = "compact_float")]
    pub hour: f64,
    #[serde(serialize_with = "compact_float")]
    pub daily: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermalMessage {
    #[serde(rename = "tempC", serialize_with = "compact_float")]
    pub temp_c: f64,
    #[serde(rename = "tempF", serialize_with = "compact_float")]
    pub temp_f: f64,
    #[serde(serialize_with = "compact_float")]
    pub humidity: f64,
    #[serde(serialize_with = "compact_float")]
    pub pressure: f64,
}

/// Daily combined record. Lightning is republished as distance only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedMessage {
    pub timestamp: i64,
    #[serde(rename = "tempC", serialize_with = "compact_float")]
    pub temp_c: f64,
    #[serde(rename = "tempF", serialize_with = "compact_float")]
    pub temp_f: f64,
    #[serde(serialize_with = "compact_float")]
    pub humidity: f64,
    #[serde(serialize_with = "compact_float")]
    pub pressure: f64,
    #[serde(rename = "windSpeed", serialize_with = "compact_float")]
    pub wind_speed: f64,
    #[serde(rename = "windDirection", serialize_with = "compact_float")]
    pub wind_direction: f64,
    #[serde(rename = "2mavg", serialize_with = "compact_float")]
    pub speed_2m_avg: f64,
    #[serde(rename = "2mdavg", serialize_with = "compact_float")]
    pub direction_2m_avg: f64,
    #[serde(rename = "10mgust", serialize_with = "compact_float")]
    pub gust_10m_speed: f64,
    #[serde(rename = "10mgdir", serialize_with = "compact_float")]
    pub gust_10m_direction: f64,
    #[serde(rename = "maxDailyGust", serialize_with = "compact_float")]
    pub max_daily_gust: f64,
    #[serde(rename = "rain1Hour", serialize_with = "compact_float")]
    pub rain_1_hour: f64,
    #[serde(rename = "rain24H", serialize_with = "compact_float")]
    pub rain_24_hour: f64,
    #[serde(rename = "uvIndex", serialize_with = "compact_float")]
    pub uv_index: f64,
    pub lightning: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Wind(WindMessage),
    Rain(RainMessage),
    Thermal(ThermalMessage),
    Unified(UnifiedMessage),
}

/// Project `reading` into `shape`, stamping unified messages with the
/// current unix time.
pub fn project(reading: &StationReading, shape: MessageShape) -> OutboundMessage {
    project_at(reading, shape, chrono::Utc::now().timestamp())
}

/// Same as [`project`] with an explicit timestamp. Only the unified shape
/// carries it.
pub fn project_at(
    reading: &StationReading,
    shape: MessageShape,
    timestamp: i64,
) -> OutboundMessage {
    let wind = &reading.wind;
    let thp = &reading.thp;
    match shape {
        MessageShape::Wind => OutboundMessage::Wind(WindMessage {
            speed: wind.speed,
            direction: wind.direction,
            speed_2m_avg: wind.speed2_minute_average,
            direction_2m_avg: wind.direction2_minute_average,
            gust_10m_speed: wind.gust_ten_minute_max_speed,
            gust_10m_direction: wind.gust_ten_minute_max_direction,
            daily_gust_max: wind.max_daily_gust,
        }),
        MessageShape::Rain => OutboundMessage::Rain(RainMessage {
            hour: reading.rain.hour,
            daily: reading.rain.daily,
        }),
        MessageShape::Thermal => OutboundMessage::Thermal(ThermalMessage {
            temp_c: thp.temp_c,
            temp_f: thp.temp_f,
            humidity: thp.humidity,
            pressure: thp.pressure,
        }),
        MessageShape::Unified => OutboundMessage::Unified(UnifiedMessage {
            timestamp,
            temp_c: thp.temp_c,
            temp_f: thp.temp_f,
            humidity: thp.humidity,
            pressure: thp.pressure,
            wind_speed: wind.speed,
            wind_direction: wind.direction,
            speed_2m_avg: wind.speed2_minute_average,
            direction_2m_avg: wind.direction2_minute_average,
            gust_10m_speed: wind.gust_ten_minute_max_speed,
            gust_10m_direction: wind.gust_ten_minute_max_direction,
            max_daily_gust: wind.max_daily_gust,
            rain_1_hour: reading.rain.hour,
            rain_24_hour: reading.rain.daily,
            uv_index: reading.uv.index,
            lightning: reading.lightning.distance,
        }),
    }
}

impl OutboundMessage {
    pub fn shape(&self) -> MessageShape {
        match self {
            OutboundMessage::Wind(_) => MessageShape::Wind,
            OutboundMessage::Rain(_) => MessageShape::Rain,
            OutboundMessage::Thermal(_) => MessageShape::Thermal,
            OutboundMessage::Unified(_) => MessageShape::Unified,
        }
    }

    /// JSON-encode the message. serde_json writes NaN and infinities as
    /// `null`, so they are rejected here instead.
    pub fn encode(&self) -> Result<Vec<u8>, PublishError> {
        let non_finite = self.floats().into_iter().find(|(_, v)| !v.is_finite());
        if let Some((field, value)) = non_finite {
            return Err(PublishError::Encode(format!(
                "{} field '{}' is not finite: {}",
                self.shape().as_str(),
                field,
                value
            )));
        }
        let bytes = match self {
            OutboundMessage::Wind(m) => serde_json::to_vec(m)?,
            OutboundMessage::Rain(m) => serde_json::to_vec(m)?,
            OutboundMessage::Thermal(m) => serde_json::to_vec(m)?,
            OutboundMessage::Unified(m) => serde_json::to_vec(m)?,
        };
        Ok(bytes)
    }

    fn floats(&self) -> Vec<(&'static str, f64)> {
        match self {
            OutboundMessage::Wind(m) => vec![
                ("speed", m.speed),
                ("direction", m.direction),
                ("2mavg", m.speed_2m_avg),
                ("2mdavg", m.direction_2m_avg),
                ("10mgust", m.gust_10m_speed),
                ("10mgdir", m.gust_10m_direction),
                ("dailyGustMax", m.daily_gust_max),
            ],
            OutboundMessage::Rain(m) => vec![("hour", m.hour), ("daily", m.daily)],
            OutboundMessage::Thermal(m) => vec![
                ("tempC", m.temp_c),
                ("tempF", m.temp_f),
                ("humidity", m.humidity),
                ("pressure", m.pressure),
            ],
            OutboundMessage::Unified(m) => vec![
                ("tempC", m.temp_c),
                ("tempF", m.temp_f),
                ("humidity", m.humidity),
                ("pressure", m.pressure),
                ("windSpeed", m.wind_speed),
                ("windDirection", m.wind_direction),
                ("2mavg", m.speed_2m_avg),
                ("2mdavg", m.direction_2m_avg),
                ("10mgust", m.gust_10m_speed),
                ("10mgdir", m.gust_10m_direction),
                ("maxDailyGust", m.max_daily_gust),
                ("rain1Hour", m.rain_1_hour),
                ("rain24H", m.rain_24_hour),
                ("uvIndex", m.uv_index),
            ],
        }
    }
}
