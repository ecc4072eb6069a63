use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::artifact::{
    Artifact, Measurements, MeasurementSeries, MeasurementValue, OutputFormat, Sample, Timestamp,
};
use crate::configuration::{Configuration, LoggingMode};
use crate::encoder::ProfileEncoder;
use crate::measurements::{HeapStatistics, MeasurementSource};
use crate::ringbuffer::Ringbuffer;
use crate::sampler::{RawProfile, Sampler};
use crate::ticker::Ticker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    Started,
    Stopped,
}

/// One start/stop-bounded profiling run.
///
/// The heap and CPU buffers are shared with the closures registered on the
/// ticker; they are only ever touched from the owning thread.
#[derive(Debug)]
pub struct Session {
    title: String,
    status: Status,
    start_instant: Instant,
    start_wall_clock: SystemTime,
    encoder: ProfileEncoder,
    heap: Rc<RefCell<Ringbuffer<u64>>>,
    cpu: Rc<RefCell<Ringbuffer<f64>>>,
}

impl Session {
    pub fn new(title: &str, configuration: &Configuration) -> Self {
        Self {
            title: title.to_owned(),
            status: Status::NotStarted,
            start_instant: Instant::now(),
            start_wall_clock: SystemTime::now(),
            encoder: ProfileEncoder::new(configuration.max_stack_depth),
            heap: Rc::new(RefCell::new(Ringbuffer::new(configuration.measurement_capacity))),
            cpu: Rc::new(RefCell::new(Ringbuffer::new(configuration.measurement_capacity))),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn heap_points(&self) -> usize {
        self.heap.borrow().len()
    }

    pub fn cpu_points(&self) -> usize {
        self.cpu.borrow().len()
    }

    /// Starts the sampler under this session's title and subscribes both
    /// measurement channels. Sessions cannot be restarted.
    pub fn start<S, M>(
        &mut self,
        sampler: &mut S,
        ticker: &mut Ticker<M>,
        configuration: &Configuration,
    ) where
        S: Sampler,
        M: MeasurementSource,
    {
        if self.status != Status::NotStarted {
            log::debug!("Session {:?} was already started", self.title);
            return;
        }

        self.start_instant = Instant::now();
        self.start_wall_clock = SystemTime::now();
        sampler.start_profiling(&self.title, &configuration.sampling_options());

        let start = self.start_instant;
        let heap = Rc::clone(&self.heap);
        ticker.add_heap_listener(
            &self.title,
            Box::new(move |now: Instant, stats: &HeapStatistics| {
                heap.borrow_mut()
                    .record(elapsed_ns(start, now), stats.used_heap_size)
            }),
        );
        let cpu = Rc::clone(&self.cpu);
        ticker.add_cpu_listener(
            &self.title,
            Box::new(move |now: Instant, load: f64| {
                cpu.borrow_mut().record(elapsed_ns(start, now), load)
            }),
        );

        self.status = Status::Started;
        log::debug!("Session {:?} started", self.title);
    }

    /// Stops the sampler and unsubscribes from the ticker. Returns whatever
    /// the sampler collected, which is `None` if it lost track of the title.
    pub fn stop<S, M>(&mut self, sampler: &mut S, ticker: &mut Ticker<M>) -> Option<S::Profile>
    where
        S: Sampler,
        M: MeasurementSource,
    {
        if self.status != Status::Started {
            return None;
        }

        let profile = sampler.stop_profiling(&self.title);
        if profile.is_none() {
            log::debug!("Sampler returned no profile for {:?}", self.title);
        }
        ticker.remove_listener(&self.title);
        self.status = Status::Stopped;
        profile
    }

    /// Encodes the session's samples and measurements. Consumes the session.
    pub fn into_artifact<P: RawProfile>(
        mut self,
        profile: &P,
        format: OutputFormat,
        thread_id: u32,
        collect_resources: bool,
        logging_mode: LoggingMode,
    ) -> Artifact {
        let encoded = self.encoder.encode(profile);
        let clock = Clock {
            format,
            start_epoch_secs: self
                .start_wall_clock
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
        };

        let samples = encoded
            .iter()
            .map(|sample| Sample {
                stack_id: sample.stack_index,
                thread_id,
                timestamp: clock.timestamp(sample.elapsed_ns),
            })
            .collect();

        let measurements = Measurements {
            memory_footprint: measurement_series(
                "memory_footprint",
                "byte",
                &self.heap.borrow(),
                &clock,
                |bytes| bytes,
            ),
            cpu_usage: measurement_series(
                "cpu_usage",
                "percent",
                &self.cpu.borrow(),
                &clock,
                |load| load,
            ),
        };

        let (stacks, frames, resources) = self.encoder.into_tables();
        Artifact {
            profile_relative_started_at_ns: profile.start_time_us().saturating_mul(1000),
            profile_relative_ended_at_ns: profile.end_time_us().saturating_mul(1000),
            profiler_logging_mode: logging_mode.as_str().to_owned(),
            samples,
            stacks,
            frames,
            resources: collect_resources.then_some(resources),
            measurements,
        }
    }
}

struct Clock {
    format: OutputFormat,
    start_epoch_secs: f64,
}

impl Clock {
    fn timestamp(&self, elapsed_ns: u64) -> Timestamp {
        match self.format {
            OutputFormat::ByElapsedTime => Timestamp::ElapsedNs(elapsed_ns),
            OutputFormat::ByAbsoluteTimestamp => {
                Timestamp::EpochSeconds(self.start_epoch_secs + elapsed_ns as f64 / 1e9)
            }
        }
    }
}

fn elapsed_ns(start: Instant, now: Instant) -> u64 {
    u64::try_from(now.saturating_duration_since(start).as_nanos()).unwrap_or(u64::MAX)
}

// A channel without any recorded point is left out entirely.
fn measurement_series<T, U>(
    channel: &str,
    unit: &str,
    buffer: &Ringbuffer<T>,
    clock: &Clock,
    convert: impl Fn(T) -> U,
) -> Option<MeasurementSeries<U>>
where
    T: Copy + Default,
{
    if buffer.is_empty() {
        return None;
    }
    match buffer.points() {
        Ok(points) => Some(MeasurementSeries {
            unit: unit.to_owned(),
            values: points
                .into_iter()
                .map(|point| MeasurementValue {
                    value: convert(point.value),
                    timestamp: clock.timestamp(point.elapsed_ns),
                })
                .collect(),
        }),
        Err(e) => {
            log::warn!("Dropping {} measurements: {}", channel, e);
            None
        }
    }
}
