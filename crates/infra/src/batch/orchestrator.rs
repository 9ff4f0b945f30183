//! Batch fan-out over the gateway
//!
//! Items are validated up front; invalid ones are recorded and never sent.
//! Valid items run concurrently (bounded by a semaphore) and the result lists
//! preserve input order. One failing item never affects its siblings.

use std::sync::Arc;

use grocy_domain::{
    BatchFailure, BatchItem, BatchResult, BatchSuccess, ErrorKind, GatewayRequest, GatewayResult,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::gateway::RequestExecutor;

/// A kind of batch: how an item is validated and turned into a request
pub trait BatchOperation: Send + Sync {
    type Item: Send;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check an item before dispatch.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    fn validate(&self, item: &Self::Item) -> Result<(), String>;

    /// Build the upstream request for a valid item
    fn to_request(&self, item: &Self::Item) -> GatewayRequest;

    /// Verb and target for [`Self::summarize`], e.g. `("Added", "to stock")`
    fn summary_parts(&self) -> (&'static str, &'static str);

    /// Human one-liner for a finished batch
    fn summarize(&self, result: &BatchResult) -> String {
        let (action, target) = self.summary_parts();
        result.summary(action, target)
    }
}

enum Slot {
    Invalid(String),
    Dispatched(JoinHandle<Result<GatewayResult, String>>),
}

/// Runs batches of items through a [`RequestExecutor`]
#[derive(Clone)]
pub struct BatchOrchestrator {
    executor: Arc<dyn RequestExecutor>,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(executor: Arc<dyn RequestExecutor>, max_concurrency: usize) -> Self {
        Self { executor, max_concurrency: max_concurrency.max(1) }
    }

    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Execute every item, continuing past failures.
    ///
    /// Item indices are positions in `items`, starting at zero.
    pub async fn execute_batch<O: BatchOperation>(&self, op: &O, items: Vec<O::Item>) -> BatchResult {
        self.execute_batch_until(op, items, &CancellationToken::new()).await
    }

    /// As [`Self::execute_batch`], stopping early when `cancel` fires.
    ///
    /// Items still pending at that point are recorded as `Cancelled`; items
    /// already finished keep their outcome. Dropping the returned future
    /// cancels the outstanding item tasks.
    pub async fn execute_batch_until<O: BatchOperation>(
        &self,
        op: &O,
        items: Vec<O::Item>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        self.run(op, items.into_iter().map(Ok).collect(), cancel).await
    }

    /// Execute items still in their JSON form.
    ///
    /// Each element is decoded on its own; one that does not decode into
    /// `O::Item` is recorded as a `Validation` failure at its index and the
    /// rest of the batch proceeds.
    pub async fn execute_batch_raw<O>(&self, op: &O, items: Vec<Value>) -> BatchResult
    where
        O: BatchOperation,
        O::Item: DeserializeOwned,
    {
        self.execute_batch_raw_until(op, items, &CancellationToken::new()).await
    }

    /// As [`Self::execute_batch_raw`], stopping early when `cancel` fires.
    pub async fn execute_batch_raw_until<O>(
        &self,
        op: &O,
        items: Vec<Value>,
        cancel: &CancellationToken,
    ) -> BatchResult
    where
        O: BatchOperation,
        O::Item: DeserializeOwned,
    {
        let decoded: Vec<Result<O::Item, String>> = items
            .into_iter()
            .map(|raw| {
                serde_json::from_value(raw).map_err(|err| format!("invalid item input: {err}"))
            })
            .collect();
        self.run(op, decoded, cancel).await
    }

    #[instrument(skip_all, fields(operation = op.name(), items = items.len()))]
    async fn run<O: BatchOperation>(
        &self,
        op: &O,
        items: Vec<Result<O::Item, String>>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let started = Instant::now();
        let batch_token = cancel.child_token();
        let _cancel_on_drop = batch_token.clone().drop_guard();
        let permits = Arc::new(Semaphore::new(self.max_concurrency));

        let slots: Vec<Slot> = items
            .into_iter()
            .enumerate()
            .map(|(index, decoded)| {
                let item = match decoded {
                    Ok(payload) => BatchItem::new(index, payload),
                    Err(message) => {
                        debug!(index, %message, "Batch item could not be decoded");
                        return Slot::Invalid(message);
                    }
                };
                if let Err(message) = op.validate(&item.payload) {
                    debug!(index, %message, "Batch item failed validation");
                    return Slot::Invalid(message);
                }
                Slot::Dispatched(self.dispatch(
                    op.to_request(&item.payload),
                    Arc::clone(&permits),
                    batch_token.child_token(),
                ))
            })
            .collect();

        let mut result = BatchResult::default();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Slot::Invalid(message) => result.failed.push(BatchFailure {
                    index,
                    kind: ErrorKind::Validation,
                    message,
                }),
                Slot::Dispatched(handle) => match handle.await {
                    Ok(Ok(outcome)) => record(&mut result, index, outcome),
                    Ok(Err(message)) => result.failed.push(BatchFailure {
                        index,
                        kind: ErrorKind::Cancelled,
                        message,
                    }),
                    Err(join_err) => result.failed.push(BatchFailure {
                        index,
                        kind: ErrorKind::Cancelled,
                        message: format!("item task ended abnormally: {join_err}"),
                    }),
                },
            }
        }

        info!(
            operation = op.name(),
            total = result.len(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            status = ?result.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch_completed"
        );
        result
    }

    fn dispatch(
        &self,
        request: GatewayRequest,
        permits: Arc<Semaphore>,
        item_token: CancellationToken,
    ) -> JoinHandle<Result<GatewayResult, String>> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = item_token.cancelled() => Err("batch cancelled before the item completed".to_string()),
                outcome = async {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| "batch concurrency limiter closed".to_string())?;
                    Ok::<_, String>(executor.execute(&request).await)
                } => outcome,
            }
        })
    }
}

fn record(result: &mut BatchResult, index: usize, outcome: GatewayResult) {
    match outcome.into_result() {
        Ok(value) => result.succeeded.push(BatchSuccess { index, outcome: value }),
        Err(err) => {
            let message = match err.detail.as_deref().map(str::trim) {
                Some(body) if !body.is_empty() => format!("{}: {body}", err.message),
                _ => err.message,
            };
            result.failed.push(BatchFailure { index, kind: err.kind, message });
        }
    }
}
