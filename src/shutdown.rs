//! Cooperative cancellation shared by both engines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

/// Cloneable stop flag, checked once per loop iteration and per wait step
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trigger this token on Ctrl-C. Must be called inside a tokio runtime.
    pub fn install_ctrl_c_handler(&self) {
        let token = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("[SIGNAL] Interrupt received, shutting down");
                    token.trigger();
                }
                Err(e) => warn!("[SIGNAL] Cannot listen for Ctrl-C: {}", e),
            }
        });
    }
}
