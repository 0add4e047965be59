//! Sensor readings and their wire representations.
//!
//! The backend dataset and the detector endpoints disagree on key spelling:
//! dataset samples carry `Current`, `Volume Flow RateRMS` and a textual
//! `datetime`, while the detectors expect `current`, `VolumeFlowRateRMS` and
//! unix seconds. [`RawSample`] models the former, [`ReadingPayload`] the
//! latter, and [`SensorReading`] is the typed value the rest of the crate
//! works with.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of sensor channels on every reading.
pub const CHANNEL_COUNT: usize = 8;

/// Naive datetime layouts accepted from the dataset, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// One named sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Accelerometer1Rms,
    Accelerometer2Rms,
    Current,
    Pressure,
    Temperature,
    Thermocouple,
    Voltage,
    VolumeFlowRateRms,
}

impl Channel {
    /// All channels in wire order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::Accelerometer1Rms,
        Channel::Accelerometer2Rms,
        Channel::Current,
        Channel::Pressure,
        Channel::Temperature,
        Channel::Thermocouple,
        Channel::Voltage,
        Channel::VolumeFlowRateRms,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Key used for this channel by the detector endpoints.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Accelerometer1Rms => "Accelerometer1RMS",
            Self::Accelerometer2Rms => "Accelerometer2RMS",
            Self::Current => "current",
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
            Self::Thermocouple => "thermocouple",
            Self::Voltage => "voltage",
            Self::VolumeFlowRateRms => "VolumeFlowRateRMS",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Per-channel values; a channel the source did not report stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelValues([Option<f64>; CHANNEL_COUNT]);

impl ChannelValues {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.0[channel.index()]
    }

    /// Value of the channel, or 0 when it was never reported.
    pub fn or_zero(&self, channel: Channel) -> f64 {
        self.get(channel).unwrap_or(0.0)
    }

    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        self.0[channel.index()] = value;
    }

    /// Builder-style setter.
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, Some(value));
        self
    }

    /// Iterate `(channel, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, Option<f64>)> + '_ {
        Channel::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

/// A timestamped multi-channel sensor sample. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    datetime: f64,
    values: ChannelValues,
}

impl SensorReading {
    /// `datetime` is the acquisition time in unix seconds.
    pub fn new(datetime: f64, values: ChannelValues) -> Self {
        Self { datetime, values }
    }

    pub fn datetime(&self) -> f64 {
        self.datetime
    }

    pub fn values(&self) -> &ChannelValues {
        &self.values
    }

    pub fn value(&self, channel: Channel) -> Option<f64> {
        self.values.get(channel)
    }
}

/// Error converting a backend sample into a [`SensorReading`].
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Unparseable sample datetime: {0}")]
    Datetime(String),
}

/// Sample timestamp as served by the backend: either text or unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleTime {
    Unix(f64),
    Text(String),
}

impl SampleTime {
    /// Unix seconds; naive datetimes are read as UTC.
    pub fn to_unix_seconds(&self) -> Result<f64, SampleError> {
        match self {
            Self::Unix(secs) => Ok(*secs),
            Self::Text(text) => parse_datetime(text)
                .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
                .ok_or_else(|| SampleError::Datetime(text.clone())),
        }
    }
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A sample exactly as the backend dataset or attack generator serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub datetime: SampleTime,
    #[serde(rename = "Accelerometer1RMS")]
    pub accelerometer1_rms: Option<f64>,
    #[serde(rename = "Accelerometer2RMS")]
    pub accelerometer2_rms: Option<f64>,
    #[serde(rename = "Current", alias = "current")]
    pub current: Option<f64>,
    #[serde(rename = "Pressure", alias = "pressure")]
    pub pressure: Option<f64>,
    #[serde(rename = "Temperature", alias = "temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Thermocouple", alias = "thermocouple")]
    pub thermocouple: Option<f64>,
    #[serde(rename = "Voltage", alias = "voltage")]
    pub voltage: Option<f64>,
    #[serde(rename = "Volume Flow RateRMS", alias = "VolumeFlowRateRMS")]
    pub volume_flow_rate_rms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Attack label on generated samples (`Fuzzy`, `DoS`, ...).
    #[serde(rename = "Attack", default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<String>,
}

impl RawSample {
    pub fn channel_values(&self) -> ChannelValues {
        let mut values = ChannelValues::default();
        values.set(Channel::Accelerometer1Rms, self.accelerometer1_rms);
        values.set(Channel::Accelerometer2Rms, self.accelerometer2_rms);
        values.set(Channel::Current, self.current);
        values.set(Channel::Pressure, self.pressure);
        values.set(Channel::Temperature, self.temperature);
        values.set(Channel::Thermocouple, self.thermocouple);
        values.set(Channel::Voltage, self.voltage);
        values.set(Channel::VolumeFlowRateRms, self.volume_flow_rate_rms);
        values
    }

    pub fn to_reading(&self) -> Result<SensorReading, SampleError> {
        Ok(SensorReading::new(
            self.datetime.to_unix_seconds()?,
            self.channel_values(),
        ))
    }
}

/// Reading object as transmitted to the detectors. Every field is required,
/// so channels missing on the client side are sent as 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingPayload {
    pub datetime: f64,
    #[serde(rename = "Accelerometer1RMS")]
    pub accelerometer1_rms: f64,
    #[serde(rename = "Accelerometer2RMS")]
    pub accelerometer2_rms: f64,
    pub current: f64,
    pub pressure: f64,
    pub temperature: f64,
    pub thermocouple: f64,
    pub voltage: f64,
    #[serde(rename = "VolumeFlowRateRMS")]
    pub volume_flow_rate_rms: f64,
}

impl ReadingPayload {
    /// Payload stamped with the reading's own acquisition time.
    pub fn from_reading(reading: &SensorReading) -> Self {
        Self::at(reading, reading.datetime())
    }

    /// Payload stamped with an explicit unix-seconds time.
    pub fn at(reading: &SensorReading, datetime: f64) -> Self {
        let v = reading.values();
        Self {
            datetime,
            accelerometer1_rms: v.or_zero(Channel::Accelerometer1Rms),
            accelerometer2_rms: v.or_zero(Channel::Accelerometer2Rms),
            current: v.or_zero(Channel::Current),
            pressure: v.or_zero(Channel::Pressure),
            temperature: v.or_zero(Channel::Temperature),
            thermocouple: v.or_zero(Channel::Thermocouple),
            voltage: v.or_zero(Channel::Voltage),
            volume_flow_rate_rms: v.or_zero(Channel::VolumeFlowRateRms),
        }
    }
}

impl From<&SensorReading> for ReadingPayload {
    fn from(reading: &SensorReading) -> Self {
        Self::from_reading(reading)
    }
}
