use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use signal_hook::{consts::signal::*, low_level};

/// Counts received SIGINT/SIGTERM. The first one asks workers to stop taking new
/// videos, the third one falls back to the default handler and kills the process.
#[derive(Clone, Debug)]
pub struct Cookie {
    count: Arc<AtomicUsize>,
}

impl Cookie {
    pub fn new() -> Result<Self, std::io::Error> {
        let count = Arc::new(AtomicUsize::new(0));

        for flag in [SIGINT, SIGTERM] {
            let count = Arc::clone(&count);
            // SAFETY: only touches an atomic and calls a function the crate itself uses
            // inside signal handlers
            unsafe {
                low_level::register(flag, move || {
                    let prev = count.fetch_add(1, Ordering::SeqCst);
                    if prev >= 2 {
                        let _ = low_level::emulate_default_handler(flag);
                    }
                })?;
            };
        }

        Ok(Self { count })
    }

    pub fn is_terminating(&self) -> bool {
        self.count.load(Ordering::SeqCst) >= 1
    }
}
