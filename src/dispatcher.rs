//! # Trigger Dispatcher
//!
//! Runs a [`Job`] once per activation on a single worker task.
//!
//! Activations go through a queue of capacity one, so at most one run is
//! executing and at most one is pending. What happens to an activation that
//! arrives while the worker is occupied is set by [`BusyPolicy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::modem::CommandInterface;
use crate::pipeline::{Peripheral, Pipeline};
use crate::webhook::Connector;

/// Work executed once per accepted activation
#[async_trait]
pub trait Job: Send + 'static {
    async fn run(&mut self);
}

#[async_trait]
impl<M, C, P> Job for Pipeline<M, C, P>
where
    M: CommandInterface + 'static,
    C: Connector + 'static,
    P: Peripheral + 'static,
{
    async fn run(&mut self) {
        // Failures are already logged by the pipeline
        let _ = self.run_once().await;
    }
}

/// Handling of activations that arrive while the worker is occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Merge into the pending run, or queue one if none is pending
    #[default]
    Coalesce,

    /// Discard while a run executes or is pending
    Drop,
}

/// What happened to one activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A run was queued
    Queued,
    /// Merged into a run that was already pending
    Coalesced,
    /// Discarded under [`BusyPolicy::Drop`]
    Dropped,
    /// The worker has stopped
    Closed,
}

/// Handle for activating the worker
///
/// Dropping every handle stops the worker once the in-flight and pending
/// runs have finished.
#[derive(Debug, Clone)]
pub struct TriggerDispatcher {
    tx: mpsc::Sender<()>,
    busy: Arc<AtomicBool>,
    policy: BusyPolicy,
}

impl TriggerDispatcher {
    /// Spawn the worker task for `job`
    ///
    /// # Returns
    ///
    /// * `(TriggerDispatcher, JoinHandle<()>)` - Activation handle and the
    ///   worker task, which completes after all handles are dropped
    pub fn spawn<J: Job>(mut job: J, policy: BusyPolicy) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = Arc::clone(&busy);

        let handle = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                worker_busy.store(true, Ordering::SeqCst);
                debug!("Run started");
                job.run().await;
                worker_busy.store(false, Ordering::SeqCst);
                debug!("Run finished");
            }
            info!("Dispatcher stopped");
        });

        (Self { tx, busy, policy }, handle)
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    /// `true` while a run is executing
    ///
    /// Under [`BusyPolicy::Drop`] the flag is also set by the activation
    /// that queues a run, so it covers the pending run as well.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Request one run
    pub fn activate(&self) -> Activation {
        let activation = match self.policy {
            BusyPolicy::Coalesce => match self.tx.try_send(()) {
                Ok(()) => Activation::Queued,
                Err(TrySendError::Full(())) => Activation::Coalesced,
                Err(TrySendError::Closed(())) => Activation::Closed,
            },
            BusyPolicy::Drop => self.activate_exclusive(),
        };

        debug!("Activation {:?}", activation);
        activation
    }

    /// Claim the worker and enqueue in one step; the worker releases the
    /// claim when the run finishes
    fn activate_exclusive(&self) -> Activation {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Activation::Dropped;
        }

        match self.tx.try_send(()) {
            Ok(()) => Activation::Queued,
            // A pending run holds the claim and will release it
            Err(TrySendError::Full(())) => Activation::Dropped,
            Err(TrySendError::Closed(())) => {
                self.busy.store(false, Ordering::SeqCst);
                Activation::Closed
            }
        }
    }
}
