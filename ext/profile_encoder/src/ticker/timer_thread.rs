use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Background thread posting a tick request every `interval`.
///
/// The thread never touches profiling state; requests are drained on the
/// owning thread with `take_pending`. At most one request is outstanding at
/// a time, so an undrained timer holds no backlog.
#[derive(Debug)]
pub struct TimerThread {
    stop_requested: Arc<AtomicBool>,
    receiver: Receiver<Instant>,
}

impl TimerThread {
    /// The first request is posted immediately.
    pub fn spawn(interval: Duration) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let stop_requested = Arc::new(AtomicBool::new(false));

        let thread_stop_requested = Arc::clone(&stop_requested);
        thread::Builder::new()
            .name("profiler-ticker".to_owned())
            .spawn(move || Self::thread_main_loop(interval, thread_stop_requested, sender))?;

        Ok(Self {
            stop_requested,
            receiver,
        })
    }

    fn thread_main_loop(
        interval: Duration,
        stop_requested: Arc<AtomicBool>,
        sender: SyncSender<Instant>,
    ) {
        loop {
            if stop_requested.load(Ordering::Relaxed) {
                break;
            }
            match sender.try_send(Instant::now()) {
                Ok(()) => log::trace!("Posted measurement tick"),
                Err(TrySendError::Full(_)) => {}
                // Receiver is gone
                Err(TrySendError::Disconnected(_)) => break,
            }
            thread::sleep(interval);
        }
    }

    /// Drains posted requests, returning how many there were (0 or 1).
    pub fn take_pending(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
