// src/metrics.rs

//! Per-action resource figures.
//!
//! Peak RSS is sampled from a side thread with `sysinfo` while the child
//! runs. Sampling is best-effort: a command that exits before the first
//! sample, or a PID that cannot be inspected, yields `None`.
//!
//! These numbers go into the run-log record only. The detail log never sees
//! them, since two identical dry runs must produce identical detail logs.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use sysinfo::{Pid, System};

/// Default gap between RSS samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

/// What one action cost.
#[derive(Debug, Clone, Default)]
pub struct InvocationMetrics {
    pub duration_ms: u64,

    /// Peak resident memory in KB, when at least one sample landed.
    pub max_rss_kb: Option<u64>,
}

/// Background sampler for one child process.
pub struct PeakRssSampler {
    done: Arc<AtomicBool>,
    peak_kb: Arc<AtomicU64>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PeakRssSampler {
    /// Begin sampling `pid`. The worker exits by itself when the process
    /// disappears.
    pub fn spawn(pid: u32, every: Duration) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let peak_kb = Arc::new(AtomicU64::new(0));

        let worker = {
            let done = Arc::clone(&done);
            let peak_kb = Arc::clone(&peak_kb);
            let pid = Pid::from_u32(pid);

            thread::spawn(move || {
                let mut system = System::new();

                while !done.load(Ordering::Relaxed) {
                    system.refresh_process(pid);
                    let Some(process) = system.process(pid) else {
                        break;
                    };

                    // bytes in sysinfo 0.30
                    peak_kb.fetch_max(process.memory() / 1024, Ordering::Relaxed);
                    thread::sleep(every);
                }
            })
        };

        Self {
            done,
            peak_kb,
            worker: Some(worker),
        }
    }

    /// Stop sampling and report the peak, if anything was measured.
    pub fn finish(mut self) -> Option<u64> {
        self.done.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        match self.peak_kb.load(Ordering::Relaxed) {
            0 => None,
            kb => Some(kb),
        }
    }
}
