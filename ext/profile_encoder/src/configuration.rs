use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MEASUREMENT_INTERVAL: Duration = Duration::from_millis(100);
// 99Hz rather than 100Hz to avoid sampling in lockstep with periodic work
pub const DEFAULT_SAMPLING_FREQUENCY_HZ: f64 = 99.0;
pub const DEFAULT_SAMPLING_INTERVAL: Duration =
    Duration::from_micros((1_000_000.0 / DEFAULT_SAMPLING_FREQUENCY_HZ) as u64);
pub const MAX_STACK_DEPTH: usize = 128;
pub const MEASUREMENT_CAPACITY: usize = 300;
pub const DEFAULT_LOGGING_MODE: LoggingMode = LoggingMode::Lazy;
pub const DEFAULT_TICKER_MODE: TickerMode = TickerMode::TimerThread;

/// Environment variable overriding the sampler's logging mode.
pub const LOGGING_MODE_ENV: &str = "SENTRY_PROFILER_LOGGING_MODE";

#[derive(Clone, Debug)]
pub struct Configuration {
    pub sampling_interval: Duration,
    pub measurement_interval: Duration,
    pub max_stack_depth: usize,
    pub measurement_capacity: usize,
    pub logging_mode: LoggingMode,
    pub ticker_mode: TickerMode,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            measurement_interval: DEFAULT_MEASUREMENT_INTERVAL,
            max_stack_depth: MAX_STACK_DEPTH,
            measurement_capacity: MEASUREMENT_CAPACITY,
            logging_mode: DEFAULT_LOGGING_MODE,
            ticker_mode: DEFAULT_TICKER_MODE,
        }
    }
}

impl Configuration {
    /// Default configuration with the logging mode taken from
    /// `SENTRY_PROFILER_LOGGING_MODE` when it holds a recognised value.
    pub fn from_env() -> Self {
        let mut configuration = Self::default();
        if let Some(mode) = logging_mode_from_env() {
            configuration.logging_mode = mode;
        }
        configuration
    }

    /// The configured logging mode unless `SENTRY_PROFILER_LOGGING_MODE`
    /// currently holds a recognised value. Read on every call.
    pub fn effective_logging_mode(&self) -> LoggingMode {
        logging_mode_from_env().unwrap_or(self.logging_mode)
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            interval: self.sampling_interval,
            logging_mode: self.effective_logging_mode(),
        }
    }
}

fn logging_mode_from_env() -> Option<LoggingMode> {
    parse_logging_mode_override(env::var(LOGGING_MODE_ENV).ok()?.as_str())
}

fn parse_logging_mode_override(value: &str) -> Option<LoggingMode> {
    match LoggingMode::from_str(value) {
        Ok(mode) => Some(mode),
        Err(_) => {
            log::debug!("Ignoring unrecognised {}={:?}", LOGGING_MODE_ENV, value);
            None
        }
    }
}

/// Options handed to the external sampler when a session starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingOptions {
    pub interval: Duration,
    pub logging_mode: LoggingMode,
}

/// Whether the sampler resolves code metadata up front (eager) or on demand (lazy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoggingMode {
    Eager,
    Lazy,
}

impl LoggingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Lazy => "lazy",
        }
    }
}

impl FromStr for LoggingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Self::Eager),
            "lazy" => Ok(Self::Lazy),
            _ => Err(()),
        }
    }
}

/// How measurement ticks reach the owning thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickerMode {
    /// A background thread posts tick requests which the host drains with
    /// `Ticker::dispatch_pending`.
    TimerThread,
    /// The host calls `Ticker::tick` itself.
    Manual,
}

impl FromStr for TickerMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timer_thread" => Ok(Self::TimerThread),
            "manual" => Ok(Self::Manual),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let configuration = Configuration::default();
        assert_eq!(configuration.measurement_interval, Duration::from_millis(100));
        assert_eq!(configuration.sampling_interval, Duration::from_micros(10101));
        assert_eq!(configuration.max_stack_depth, 128);
        assert_eq!(configuration.measurement_capacity, 300);
        assert_eq!(configuration.logging_mode, LoggingMode::Lazy);
    }

    #[test]
    fn test_logging_mode_from_str() {
        assert_eq!(LoggingMode::from_str("eager"), Ok(LoggingMode::Eager));
        assert_eq!(LoggingMode::from_str("lazy"), Ok(LoggingMode::Lazy));
        assert_eq!(LoggingMode::from_str("EAGER"), Err(()));
        assert_eq!(LoggingMode::from_str(""), Err(()));
        assert_eq!(LoggingMode::Eager.as_str(), "eager");
    }

    #[test]
    fn test_logging_mode_override_values() {
        assert_eq!(parse_logging_mode_override("eager"), Some(LoggingMode::Eager));
        assert_eq!(parse_logging_mode_override("lazy"), Some(LoggingMode::Lazy));
        assert_eq!(parse_logging_mode_override("verbose"), None);
        assert_eq!(parse_logging_mode_override(""), None);
    }

    #[test]
    fn test_ticker_mode_from_str() {
        assert_eq!(TickerMode::from_str("manual"), Ok(TickerMode::Manual));
        assert_eq!(TickerMode::from_str("timer_thread"), Ok(TickerMode::TimerThread));
        assert_eq!(TickerMode::from_str("signal"), Err(()));
    }
}
