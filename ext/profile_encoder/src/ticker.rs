mod timer_thread;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::configuration::TickerMode;
use crate::measurements::{cpu_load, HeapStatistics, MeasurementSource};

pub use timer_thread::TimerThread;

/// Returns `true` once it wants no further readings.
pub type HeapListener = Box<dyn FnMut(Instant, &HeapStatistics) -> bool>;
/// Returns `true` once it wants no further readings.
pub type CpuListener = Box<dyn FnMut(Instant, f64) -> bool>;

/// Periodic heap/CPU measurement scheduler shared by all sessions.
///
/// Listeners are keyed by session id, one map per channel. The timer is
/// armed while at least one listener is registered on either channel.
/// Everything here runs on the thread owning the ticker; in
/// `TickerMode::TimerThread` a background thread only posts tick requests
/// which `dispatch_pending` turns into ticks.
pub struct Ticker<M: MeasurementSource> {
    period: Duration,
    mode: TickerMode,
    source: M,
    heap_listeners: HashMap<String, HeapListener>,
    cpu_listeners: HashMap<String, CpuListener>,
    armed: bool,
    timer: Option<TimerThread>,
}

impl<M: MeasurementSource> Ticker<M> {
    pub fn new(period: Duration, mode: TickerMode, source: M) -> Self {
        Self {
            period,
            mode,
            source,
            heap_listeners: HashMap::new(),
            cpu_listeners: HashMap::new(),
            armed: false,
            timer: None,
        }
    }

    pub fn add_heap_listener(&mut self, session_id: &str, listener: HeapListener) {
        let was_idle = self.listener_count() == 0;
        self.heap_listeners.insert(session_id.to_owned(), listener);
        if was_idle {
            self.arm();
        }
    }

    pub fn add_cpu_listener(&mut self, session_id: &str, listener: CpuListener) {
        let was_idle = self.listener_count() == 0;
        self.cpu_listeners.insert(session_id.to_owned(), listener);
        if was_idle {
            self.arm();
        }
    }

    /// Removes the session's listeners from both channels and returns how
    /// many were removed.
    pub fn remove_listener(&mut self, session_id: &str) -> usize {
        let removed = usize::from(self.heap_listeners.remove(session_id).is_some())
            + usize::from(self.cpu_listeners.remove(session_id).is_some());
        if self.listener_count() == 0 {
            self.disarm();
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.heap_listeners.len() + self.cpu_listeners.len()
    }

    pub fn has_heap_listener(&self, session_id: &str) -> bool {
        self.heap_listeners.contains_key(session_id)
    }

    pub fn has_cpu_listener(&self, session_id: &str) -> bool {
        self.cpu_listeners.contains_key(session_id)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn source_mut(&mut self) -> &mut M {
        &mut self.source
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Takes one reading per channel with listeners and hands it to each of
    /// them. Listeners reporting done are dropped during the same pass.
    pub fn tick_at(&mut self, now: Instant) {
        if !self.heap_listeners.is_empty() {
            match self.source.heap_statistics() {
                Some(stats) => self.heap_listeners.retain(|session_id, listener| {
                    let done = listener(now, &stats);
                    if done {
                        log::debug!("Heap channel of {:?} is full, unsubscribing", session_id);
                    }
                    !done
                }),
                None => log::trace!("No heap statistics available, skipping tick"),
            }
        }

        if !self.cpu_listeners.is_empty() {
            match self.source.cpu_times() {
                Some(cpus) => {
                    let load = cpu_load(&cpus);
                    self.cpu_listeners.retain(|session_id, listener| {
                        let done = listener(now, load);
                        if done {
                            log::debug!("CPU channel of {:?} is full, unsubscribing", session_id);
                        }
                        !done
                    });
                }
                None => log::trace!("No CPU times available, skipping tick"),
            }
        }

        if self.listener_count() == 0 {
            self.disarm();
        }
    }

    /// Runs a single tick if the timer thread posted a request since the
    /// last call. Periods the host missed are not made up for.
    pub fn dispatch_pending(&mut self) -> bool {
        let posted = match &self.timer {
            Some(timer) => timer.take_pending() > 0,
            None => false,
        };
        if posted {
            self.tick();
        }
        posted
    }

    fn arm(&mut self) {
        self.armed = true;
        if self.mode != TickerMode::TimerThread || self.timer.is_some() {
            return;
        }
        match TimerThread::spawn(self.period) {
            Ok(timer) => {
                log::debug!("Measurement timer armed ({:?})", self.period);
                self.timer = Some(timer);
            }
            Err(e) => log::error!("Failed to spawn measurement timer thread: {}", e),
        }
    }

    fn disarm(&mut self) {
        if self.armed {
            log::debug!("Measurement timer disarmed");
        }
        self.armed = false;
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl<M: MeasurementSource> Drop for Ticker<M> {
    fn drop(&mut self) {
        self.disarm();
    }
}
