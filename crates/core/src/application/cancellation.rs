// Cooperative cancellation for running job units

use crate::domain::JobId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Advisory cancellation signal observed by a running unit
#[derive(Debug, Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Token that never fires (detached execution, tests)
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested
    ///
    /// Pends forever when the sender is gone without signalling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Signals for instances currently executing in this process
#[derive(Default)]
pub struct CancellationRegistry {
    senders: Mutex<HashMap<JobId, watch::Sender<bool>>>,
}

impl CancellationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a running instance and hand out its token
    pub fn register(&self, job_id: &str) -> CancellationToken {
        let (tx, rx) = watch::channel(false);
        if let Ok(mut senders) = self.senders.lock() {
            senders.insert(job_id.to_string(), tx);
        }
        CancellationToken { rx }
    }

    /// Signal a running instance; false when it is not executing here
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.senders.lock() {
            Ok(senders) => senders
                .get(job_id)
                .map(|tx| tx.send(true).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub fn unregister(&self, job_id: &str) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.remove(job_id);
        }
    }
}
