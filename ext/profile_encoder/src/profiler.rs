use std::collections::HashMap;

use crate::artifact::{Artifact, OutputFormat};
use crate::configuration::Configuration;
use crate::error::Error;
use crate::logging;
use crate::measurements::MeasurementSource;
use crate::sampler::Sampler;
use crate::session::Session;
use crate::ticker::Ticker;

/// Registry of active profiling sessions, keyed by title.
///
/// Owns the sampler and the measurement ticker shared by every session.
/// At most one session is active per title; starting a title again discards
/// the running session first. Meant to live for the whole process (or VM
/// context) on the thread that drives the sampler.
pub struct Profiler<S: Sampler, M: MeasurementSource> {
    configuration: Configuration,
    sampler: S,
    ticker: Ticker<M>,
    sessions: HashMap<String, Session>,
    disposed: bool,
}

impl<S: Sampler, M: MeasurementSource> Profiler<S, M> {
    pub fn new(configuration: Configuration, sampler: S, measurement_source: M) -> Self {
        logging::init();
        let ticker = Ticker::new(
            configuration.measurement_interval,
            configuration.ticker_mode,
            measurement_source,
        );
        Self {
            configuration,
            sampler,
            ticker,
            sessions: HashMap::new(),
            disposed: false,
        }
    }

    pub fn start_profiling(&mut self, title: &str) -> Result<(), Error> {
        self.ensure_initialized()?;
        validate_title(title)?;

        if let Some(previous) = self.sessions.remove(title) {
            log::debug!("Profile {:?} is already running, discarding it", title);
            self.discard(previous);
        }

        let mut session = Session::new(title, &self.configuration);
        session.start(&mut self.sampler, &mut self.ticker, &self.configuration);
        self.sessions.insert(title.to_owned(), session);
        Ok(())
    }

    /// Stops the session running under `title` and encodes it.
    ///
    /// Returns `Ok(None)` when no session is active under `title`, or when
    /// the sampler had nothing for it.
    pub fn stop_profiling(
        &mut self,
        title: &str,
        format: OutputFormat,
        thread_id: u32,
        collect_resources: bool,
    ) -> Result<Option<Artifact>, Error> {
        self.ensure_initialized()?;
        validate_title(title)?;

        let Some(mut session) = self.sessions.remove(title) else {
            log::debug!("No active profile for {:?}", title);
            return Ok(None);
        };
        let Some(profile) = session.stop(&mut self.sampler, &mut self.ticker) else {
            return Ok(None);
        };

        let artifact = session.into_artifact(
            &profile,
            format,
            thread_id,
            collect_resources,
            self.configuration.effective_logging_mode(),
        );
        log::debug!(
            "Profile {:?} stopped with {} samples",
            title,
            artifact.samples.len()
        );
        Ok(Some(artifact))
    }

    pub fn is_active(&self, title: &str) -> bool {
        self.sessions.contains_key(title)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn ticker(&self) -> &Ticker<M> {
        &self.ticker
    }

    /// Takes one measurement reading right away.
    pub fn tick(&mut self) {
        self.ticker.tick();
    }

    /// Runs a tick if the timer thread asked for one. Hosts call this from
    /// their event loop.
    pub fn dispatch_pending_ticks(&mut self) -> bool {
        self.ticker.dispatch_pending()
    }

    /// Stops and drops every active session and releases the sampler.
    /// The profiler rejects all further calls.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let titles: Vec<String> = self.sessions.keys().cloned().collect();
        for title in titles {
            if let Some(session) = self.sessions.remove(&title) {
                self.discard(session);
            }
        }
        self.sampler.dispose();
        self.disposed = true;
        log::debug!("Profiler disposed");
    }

    fn discard(&mut self, mut session: Session) {
        let _ = session.stop(&mut self.sampler, &mut self.ticker);
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.disposed {
            Err(Error::Uninitialized)
        } else {
            Ok(())
        }
    }
}

impl<S: Sampler, M: MeasurementSource> Drop for Profiler<S, M> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn validate_title(title: &str) -> Result<(), Error> {
    if title.is_empty() {
        return Err(Error::InvalidArgument(
            "title must be a non-empty string".to_owned(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::env;
    use std::thread;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::artifact::Timestamp;
    use crate::call_tree::{FrameInfo, RecordingSampler};
    use crate::configuration::{LoggingMode, TickerMode, LOGGING_MODE_ENV};
    use crate::ticker::tests::ScriptedSource;

    fn profiler() -> Profiler<RecordingSampler, ScriptedSource> {
        profiler_with(Configuration {
            ticker_mode: TickerMode::Manual,
            ..Default::default()
        })
    }

    fn profiler_with(configuration: Configuration) -> Profiler<RecordingSampler, ScriptedSource> {
        Profiler::new(configuration, RecordingSampler::new(), ScriptedSource::default())
    }

    fn frame(name: &str, line: i32) -> FrameInfo {
        FrameInfo::script(name, &format!("/app/src/{}.js", name), line, 1)
    }

    fn record(profiler: &mut Profiler<RecordingSampler, ScriptedSource>, stack: &[FrameInfo]) {
        let sampler = profiler.sampler_mut();
        let now = sampler.now_us();
        sampler.record_sample_at(stack, now);
    }

    #[test]
    fn test_end_to_end() {
        let mut profiler = profiler();
        profiler.start_profiling("p1").unwrap();

        let shared = [frame("main", 1), frame("handler", 10), frame("parse", 20)];
        let unique_a = [frame("main", 1), frame("handler", 10), frame("render", 30)];
        let unique_b = [frame("main", 1), frame("idle", 40)];
        record(&mut profiler, &shared);
        record(&mut profiler, &unique_a);
        record(&mut profiler, &shared);
        record(&mut profiler, &unique_b);
        record(&mut profiler, &shared);

        let artifact = profiler
            .stop_profiling("p1", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();

        assert_eq!(artifact.samples.len(), 5);
        assert_eq!(artifact.stacks.len(), 3);
        assert!(artifact.samples.iter().all(|s| s.stack_id < 3));
        assert_eq!(artifact.samples[0].stack_id, artifact.samples[2].stack_id);
        assert_eq!(artifact.samples[0].stack_id, artifact.samples[4].stack_id);

        // main, handler, parse, render, idle
        assert_eq!(artifact.frames.len(), 5);
        for stack in &artifact.stacks {
            assert!(stack.iter().all(|frame| *frame < artifact.frames.len()));
        }
        assert!(artifact
            .samples
            .iter()
            .all(|s| matches!(s.timestamp, Timestamp::ElapsedNs(_))));
        assert!(!profiler.is_active("p1"));
    }

    #[test]
    fn test_stop_never_started_returns_none() {
        let mut profiler = profiler();
        assert_eq!(
            profiler.stop_profiling("never-started", OutputFormat::ByElapsedTime, 0, false),
            Ok(None)
        );
    }

    #[test]
    fn test_stop_twice_returns_none() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        assert!(profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .is_some());
        assert_eq!(
            profiler.stop_profiling("t", OutputFormat::ByElapsedTime, 0, false),
            Ok(None)
        );
    }

    #[test]
    fn test_restart_discards_previous_session() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        record(&mut profiler, &[frame("before", 1)]);
        profiler.start_profiling("t").unwrap();

        assert_eq!(profiler.active_sessions(), 1);
        assert_eq!(profiler.ticker().listener_count(), 2);
        assert_eq!(profiler.sampler().active_count(), 1);

        record(&mut profiler, &[frame("after", 1)]);
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();
        assert_eq!(artifact.samples.len(), 1);
        assert_eq!(artifact.frames[0].function, "after");
        assert_eq!(profiler.ticker().listener_count(), 0);
    }

    #[test]
    fn test_stop_unregisters_both_channels() {
        let mut profiler = profiler();
        profiler.start_profiling("a").unwrap();
        profiler.start_profiling("b").unwrap();
        assert_eq!(profiler.ticker().listener_count(), 4);

        profiler
            .stop_profiling("a", OutputFormat::ByElapsedTime, 0, false)
            .unwrap();
        assert_eq!(profiler.ticker().listener_count(), 2);
        assert!(profiler.ticker().is_armed());

        profiler
            .stop_profiling("b", OutputFormat::ByElapsedTime, 0, false)
            .unwrap();
        assert_eq!(profiler.ticker().listener_count(), 0);
        assert!(!profiler.ticker().is_armed());
    }

    #[test]
    fn test_measurements_absent_without_ticks() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();
        assert_eq!(artifact.measurements.memory_footprint, None);
        assert_eq!(artifact.measurements.cpu_usage, None);
        assert_eq!(serde_json::to_value(&artifact).unwrap()["measurements"], json!({}));
    }

    #[test]
    fn test_measurements_are_recorded_per_tick() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        profiler.tick();
        profiler.tick();
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();

        let memory = artifact.measurements.memory_footprint.unwrap();
        assert_eq!(memory.unit, "byte");
        let bytes: Vec<u64> = memory.values.iter().map(|v| v.value).collect();
        assert_eq!(bytes, vec![1024, 2048]);

        let cpu = artifact.measurements.cpu_usage.unwrap();
        assert_eq!(cpu.unit, "percent");
        assert_eq!(cpu.values.len(), 2);
        assert_eq!(cpu.values[0].value, 0.25);

        // Ticks after the stop reach nobody
        profiler.tick();
        assert_eq!(profiler.ticker().listener_count(), 0);
    }

    #[test]
    fn test_timer_thread_ticks_are_dispatched_by_the_host() {
        let mut profiler = profiler_with(Configuration {
            ticker_mode: TickerMode::TimerThread,
            measurement_interval: Duration::from_millis(1),
            ..Default::default()
        });
        assert!(!profiler.dispatch_pending_ticks());

        profiler.start_profiling("t").unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(profiler.dispatch_pending_ticks());
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();

        // Every period missed while the host was busy collapses into one reading
        assert_eq!(artifact.measurements.memory_footprint.unwrap().values.len(), 1);
        assert_eq!(artifact.measurements.cpu_usage.unwrap().values.len(), 1);
        assert!(!profiler.ticker().is_armed());
        assert!(!profiler.dispatch_pending_ticks());
    }

    #[test]
    fn test_full_buffers_unsubscribe_after_capacity() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        for _ in 0..300 {
            profiler.tick();
        }
        assert_eq!(profiler.ticker().listener_count(), 2);
        profiler.tick();
        assert_eq!(profiler.ticker().listener_count(), 0);
        for _ in 0..10 {
            profiler.tick();
        }

        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();
        assert_eq!(artifact.measurements.memory_footprint.unwrap().values.len(), 300);
        assert_eq!(artifact.measurements.cpu_usage.unwrap().values.len(), 300);
    }

    #[test]
    fn test_collect_resources() {
        let mut profiler = profiler();
        profiler.start_profiling("t").unwrap();
        record(&mut profiler, &[frame("main", 1), frame("a", 2)]);
        record(&mut profiler, &[frame("main", 1), FrameInfo::native("gc")]);
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 9, true)
            .unwrap()
            .unwrap();
        assert_eq!(
            artifact.resources,
            Some(vec!["/app/src/a.js".to_owned(), "/app/src/main.js".to_owned()])
        );
        assert_eq!(artifact.samples[0].thread_id, 9);
        assert_eq!(artifact.frames[0].module.as_deref(), Some("app.src:a"));
    }

    #[test]
    fn test_artifact_json_shape() {
        let mut profiler = profiler_with(Configuration {
            ticker_mode: TickerMode::Manual,
            logging_mode: LoggingMode::Eager,
            ..Default::default()
        });
        profiler.start_profiling("t").unwrap();
        record(&mut profiler, &[frame("main", 1)]);
        profiler.tick();
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 3, false)
            .unwrap()
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&artifact.to_json().unwrap()).unwrap();
        assert_eq!(value["profiler_logging_mode"], "eager");
        assert_eq!(value["samples"][0]["thread_id"], "3");
        assert!(value["samples"][0]["elapsed_since_start_ns"].is_u64());
        assert_eq!(value["stacks"], json!([[0]]));
        assert_eq!(value["frames"][0]["function"], "main");
        assert_eq!(value["frames"][0]["in_app"], true);
        assert!(value.get("resources").is_none());
        assert_eq!(value["measurements"]["memory_footprint"]["unit"], "byte");
        assert!(value["measurements"]["cpu_usage"]["values"][0]["elapsed_since_start_ns"].is_u64());
        assert_eq!(value["measurements"]["cpu_usage"]["values"][0]["value"], 0.25);
    }

    #[test]
    fn test_logging_mode_env_override_reaches_artifact() {
        // No other test sets the variable; "eager" agrees with every test
        // that configures a mode explicitly.
        env::set_var(LOGGING_MODE_ENV, "eager");
        let mut profiler = profiler();
        assert_eq!(profiler.configuration().logging_mode, LoggingMode::Lazy);
        profiler.start_profiling("t").unwrap();
        assert_eq!(
            profiler.sampler().options().map(|options| options.logging_mode),
            Some(LoggingMode::Eager)
        );
        let artifact = profiler
            .stop_profiling("t", OutputFormat::ByElapsedTime, 0, false)
            .unwrap()
            .unwrap();
        env::remove_var(LOGGING_MODE_ENV);

        assert_eq!(artifact.profiler_logging_mode, "eager");
    }

    #[test]
    fn test_invalid_titles_are_rejected() {
        let mut profiler = profiler();
        assert!(matches!(
            profiler.start_profiling(""),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            profiler.stop_profiling("", OutputFormat::ByElapsedTime, 0, false),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(profiler.active_sessions(), 0);
    }

    #[test]
    fn test_many_concurrent_sessions_share_the_ticker() {
        let mut profiler = profiler();
        let titles: Vec<String> = (0..64).map(|i| format!("session-{}", i)).collect();
        for title in &titles {
            profiler.start_profiling(title).unwrap();
        }
        assert_eq!(profiler.active_sessions(), 64);
        assert_eq!(profiler.ticker().listener_count(), 128);

        record(&mut profiler, &[frame("main", 1)]);
        profiler.tick();

        let mut seen = HashSet::new();
        for title in &titles {
            let artifact = profiler
                .stop_profiling(title, OutputFormat::ByElapsedTime, 0, false)
                .unwrap()
                .unwrap();
            assert_eq!(artifact.samples.len(), 1);
            assert_eq!(artifact.measurements.memory_footprint.unwrap().values.len(), 1);
            seen.insert(title.clone());
        }
        assert_eq!(seen.len(), 64);
        assert_eq!(profiler.ticker().listener_count(), 0);
    }

    #[test]
    fn test_dispose_stops_everything() {
        let mut profiler = profiler();
        profiler.start_profiling("a").unwrap();
        profiler.start_profiling("b").unwrap();

        profiler.dispose();
        assert_eq!(profiler.active_sessions(), 0);
        assert_eq!(profiler.ticker().listener_count(), 0);
        assert_eq!(profiler.sampler().active_count(), 0);

        assert_eq!(profiler.start_profiling("c"), Err(Error::Uninitialized));
        assert_eq!(
            profiler.stop_profiling("a", OutputFormat::ByElapsedTime, 0, false),
            Err(Error::Uninitialized)
        );
        // Idempotent
        profiler.dispose();
    }
}
