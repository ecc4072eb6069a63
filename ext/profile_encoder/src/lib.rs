//! Turns sampled call stacks and periodic heap/CPU readings into a compact,
//! deduplicated profile.

extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod artifact;
pub mod call_tree;
pub mod configuration;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod measurements;
pub mod module_path;
pub mod profiler;
pub mod ringbuffer;
pub mod sampler;
pub mod session;
pub mod stack_identity;
pub mod ticker;

pub use artifact::{Artifact, OutputFormat};
pub use call_tree::{CallTree, FrameInfo, RecordingSampler};
pub use configuration::{Configuration, LoggingMode, TickerMode};
pub use error::Error;
pub use measurements::{MeasurementSource, ProcessMeasurements, SystemMeasurements};
pub use module_path::normalize_module_path;
pub use profiler::Profiler;
pub use sampler::{RawProfile, Sampler, SourceType, StackNode};
