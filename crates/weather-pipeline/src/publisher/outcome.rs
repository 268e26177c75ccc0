use std::collections::BTreeMap;

use serde::Serialize;

/// Final state of one submitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Broker confirmed the message.
    Acknowledged,
    /// Broker (or client) definitively gave up on the message.
    Failed(String),
}

/// Per-run record of delivery outcomes, keyed by event index.
#[derive(Debug, Default)]
pub struct OutcomeCollector {
    outcomes: BTreeMap<usize, DeliveryOutcome>,
}

impl OutcomeCollector {
    pub fn record(&mut self, index: usize, outcome: DeliveryOutcome) {
        if let Some(previous) = self.outcomes.insert(index, outcome) {
            log::warn!(
                "Event {} reported twice, replacing earlier outcome {:?}",
                index,
                previous
            );
        }
    }

    /// Number of events with a known outcome.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn into_report(self) -> PublishReport {
        let mut report = PublishReport {
            attempted: self.outcomes.len(),
            ..Default::default()
        };
        for (index, outcome) in self.outcomes {
            match outcome {
                DeliveryOutcome::Acknowledged => report.acknowledged += 1,
                DeliveryOutcome::Failed(reason) => report.failed.push((index, reason)),
            }
        }
        report
    }
}

/// Summary of one publish run.
///
/// `failed` is ordered by event index and
/// `acknowledged + failed.len() == attempted` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub attempted: usize,
    pub acknowledged: usize,
    pub failed: Vec<(usize, String)>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Every attempted event has a known outcome.
    pub fn is_complete(&self) -> bool {
        self.acknowledged + self.failed.len() == self.attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_orders_failures_by_index() {
        let mut collector = OutcomeCollector::default();
        collector.record(3, DeliveryOutcome::Failed("leader not available".into()));
        collector.record(0, DeliveryOutcome::Acknowledged);
        collector.record(1, DeliveryOutcome::Failed("message too large".into()));
        collector.record(2, DeliveryOutcome::Acknowledged);

        let report = collector.into_report();
        assert_eq!(report.attempted, 4);
        assert_eq!(report.acknowledged, 2);
        assert_eq!(
            report.failed,
            vec![
                (1, "message too large".to_string()),
                (3, "leader not available".to_string())
            ]
        );
        assert!(report.is_complete());
        assert!(!report.is_success());
    }

    #[test]
    fn test_duplicate_outcome_counts_once() {
        let mut collector = OutcomeCollector::default();
        collector.record(0, DeliveryOutcome::Failed("timeout".into()));
        collector.record(0, DeliveryOutcome::Acknowledged);
        assert_eq!(collector.len(), 1);
        let report = collector.into_report();
        assert_eq!(report.acknowledged, 1);
        assert!(report.is_complete());
    }

    #[test]
    fn test_empty_report() {
        let report = OutcomeCollector::default().into_report();
        assert_eq!(report, PublishReport::default());
        assert!(report.is_success());
        assert!(report.is_complete());
    }

    #[test]
    fn test_report_json() {
        let report = PublishReport {
            attempted: 2,
            acknowledged: 1,
            failed: vec![(1, "rejected".into())],
        };
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"attempted":2,"acknowledged":1,"failed":[[1,"rejected"]]}"#
        );
    }
}
