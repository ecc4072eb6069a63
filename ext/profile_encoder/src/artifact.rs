use crate::error::Error;
use crate::stack_identity::StackIndex;

pub type FrameIndex = usize;

/// How sample and measurement timestamps are expressed in the artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Nanoseconds since the session started.
    ByElapsedTime,
    /// Seconds since the UNIX epoch.
    ByAbsoluteTimestamp,
}

impl TryFrom<u8> for OutputFormat {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ByElapsedTime),
            1 => Ok(Self::ByAbsoluteTimestamp),
            _ => Err(Error::InvalidArgument(format!(
                "unknown output format {} (expected 0 or 1)",
                value
            ))),
        }
    }
}

/// The encoded profile of one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub profile_relative_started_at_ns: i64,
    pub profile_relative_ended_at_ns: i64,
    pub profiler_logging_mode: String,
    pub samples: Vec<Sample>,
    /// Each stack lists frame indices from the leaf upwards.
    pub stacks: Vec<Vec<FrameIndex>>,
    pub frames: Vec<Frame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    pub measurements: Measurements,
}

impl Artifact {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub stack_id: StackIndex,
    #[serde(with = "thread_id_as_string")]
    pub thread_id: u32,
    #[serde(flatten)]
    pub timestamp: Timestamp,
}

/// Serialised as a single field whose name depends on the output format.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Timestamp {
    #[serde(rename = "elapsed_since_start_ns")]
    ElapsedNs(u64),
    #[serde(rename = "timestamp")]
    EpochSeconds(f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub function: String,
    pub abs_path: String,
    pub filename: String,
    pub lineno: i32,
    pub colno: i32,
    pub in_app: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_footprint: Option<MeasurementSeries<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<MeasurementSeries<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSeries<T> {
    pub unit: String,
    pub values: Vec<MeasurementValue<T>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeasurementValue<T> {
    pub value: T,
    #[serde(flatten)]
    pub timestamp: Timestamp,
}

mod thread_id_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(thread_id: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(thread_id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_output_format_codes() {
        assert_eq!(OutputFormat::try_from(0), Ok(OutputFormat::ByElapsedTime));
        assert_eq!(OutputFormat::try_from(1), Ok(OutputFormat::ByAbsoluteTimestamp));
        assert!(matches!(
            OutputFormat::try_from(2),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sample_timestamp_field_follows_format() {
        let elapsed = Sample {
            stack_id: 3,
            thread_id: 7,
            timestamp: Timestamp::ElapsedNs(1500),
        };
        assert_eq!(
            serde_json::to_value(elapsed).unwrap(),
            json!({"stack_id": 3, "thread_id": "7", "elapsed_since_start_ns": 1500})
        );

        let absolute = Sample {
            stack_id: 0,
            thread_id: 0,
            timestamp: Timestamp::EpochSeconds(1700000000.5),
        };
        assert_eq!(
            serde_json::to_value(absolute).unwrap(),
            json!({"stack_id": 0, "thread_id": "0", "timestamp": 1700000000.5})
        );
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let artifact = Artifact {
            profile_relative_started_at_ns: 0,
            profile_relative_ended_at_ns: 10,
            profiler_logging_mode: "lazy".to_owned(),
            samples: vec![],
            stacks: vec![vec![0]],
            frames: vec![Frame {
                function: "(program)".to_owned(),
                abs_path: String::new(),
                filename: String::new(),
                lineno: 0,
                colno: 0,
                in_app: false,
                module: None,
            }],
            resources: None,
            measurements: Measurements::default(),
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert!(value.get("resources").is_none());
        assert_eq!(value["measurements"], json!({}));
        assert!(value["frames"][0].get("module").is_none());
        assert_eq!(value["profiler_logging_mode"], "lazy");
    }

    #[test]
    fn test_measurement_series_shape() {
        let measurements = Measurements {
            memory_footprint: Some(MeasurementSeries {
                unit: "byte".to_owned(),
                values: vec![MeasurementValue {
                    value: 4096,
                    timestamp: Timestamp::ElapsedNs(100),
                }],
            }),
            cpu_usage: None,
        };
        assert_eq!(
            serde_json::to_value(&measurements).unwrap(),
            json!({
                "memory_footprint": {
                    "unit": "byte",
                    "values": [{"value": 4096, "elapsed_since_start_ns": 100}]
                }
            })
        );
    }

    #[test]
    fn test_json_reads_back() {
        let sample = Sample {
            stack_id: 1,
            thread_id: 42,
            timestamp: Timestamp::ElapsedNs(99),
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }
}
