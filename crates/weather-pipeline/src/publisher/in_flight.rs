use std::collections::BTreeMap;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::time::Instant;

use super::outcome::{DeliveryOutcome, OutcomeCollector};
use crate::broker::PendingDelivery;

/// Submitted events whose outcome is not known yet.
///
/// Resolved handles are moved into the [`OutcomeCollector`] as they complete;
/// nothing leaves this set except through `record` or `expire`.
#[derive(Default)]
pub(crate) struct InFlight {
    pending: FuturesUnordered<BoxFuture<'static, (usize, DeliveryOutcome)>>,
    labels: BTreeMap<usize, String>,
}

impl InFlight {
    pub fn push(&mut self, index: usize, label: String, handle: PendingDelivery) {
        self.labels.insert(index, label);
        self.pending
            .push(handle.map(move |outcome| (index, outcome)).boxed());
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Collect every handle that already resolved, without waiting.
    pub fn drain_ready(&mut self, collector: &mut OutcomeCollector) {
        while let Some(Some((index, outcome))) = self.pending.next().now_or_never() {
            self.record(index, outcome, collector);
        }
    }

    /// Wait for the next resolution. Returns `false` if `until` passed first
    /// or nothing is in flight.
    pub async fn wait_one(&mut self, until: Instant, collector: &mut OutcomeCollector) -> bool {
        if self.is_empty() {
            return false;
        }
        match tokio::time::timeout_at(until, self.pending.next()).await {
            Ok(Some((index, outcome))) => {
                self.record(index, outcome, collector);
                true
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Drive every handle to an outcome. Returns `false` if `deadline` passed
    /// with handles still unresolved.
    pub async fn drive_until_quiescent(
        &mut self,
        deadline: Instant,
        collector: &mut OutcomeCollector,
    ) -> bool {
        while !self.is_empty() {
            if !self.wait_one(deadline, collector).await {
                return self.is_empty();
            }
        }
        true
    }

    /// Record every remaining event as failed with `reason`.
    pub fn expire(&mut self, reason: &str, collector: &mut OutcomeCollector) {
        for (index, label) in std::mem::take(&mut self.labels) {
            log::warn!("Delivery of event {} ({}) unconfirmed: {}", index, label, reason);
            collector.record(index, DeliveryOutcome::Failed(reason.to_string()));
        }
        self.pending = FuturesUnordered::new();
    }

    fn record(&mut self, index: usize, outcome: DeliveryOutcome, collector: &mut OutcomeCollector) {
        let label = self.labels.remove(&index).unwrap_or_default();
        match &outcome {
            DeliveryOutcome::Acknowledged => log::debug!("Sent: {}", label),
            DeliveryOutcome::Failed(reason) => {
                log::warn!("Delivery failed for event {} ({}): {}", index, label, reason)
            }
        }
        collector.record(index, outcome);
    }
}
