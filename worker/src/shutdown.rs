use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

/// Shared shutdown state: consumers stop pulling new deliveries as soon as
/// `requested()` is true, and `in_flight` lets `main` wait for whatever is
/// already running to finish before the process closes its connections.
pub struct Shutdown {
    requested: AtomicBool,
    in_flight: AtomicUsize,
}

impl Shutdown {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { requested: AtomicBool::new(false), in_flight: AtomicUsize::new(0) })
    }

    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    pub fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Polls `in_flight` down to zero, bailing out after `timeout` so a
    /// stuck handler can't wedge the shutdown forever.
    pub async fn wait_for_drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Installs the SIGINT/SIGTERM hook the same way the workspace's other
/// binaries do: a dedicated thread watches `signals.forever()` and flips the
/// shared flag once, letting the async side of the program notice it and
/// wind down instead of exiting the process immediately.
pub fn install(shutdown: Arc<Shutdown>) {
    let mut signals = Signals::new([SIGINT, SIGTERM]).expect("failed to setup signals hook");

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            tracing::info!(signal = sig, "received shutdown signal");
            shutdown.requested.store(true, Ordering::SeqCst);
        }
    });
}
