use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::error::WebhookError;
use crate::webhook::{CanonicalEvent, Provider};

/// Default number of deliveries kept in memory
pub const DEFAULT_MAX_DELIVERIES: usize = 100;

/// Outcome of one webhook delivery
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Accepted { event: CanonicalEvent },
    Ignored,
    Rejected { reason: String },
}

impl DeliveryOutcome {
    pub fn from_result(result: &Result<Option<CanonicalEvent>, WebhookError>) -> Self {
        match result {
            Ok(Some(event)) => DeliveryOutcome::Accepted {
                event: event.clone(),
            },
            Ok(None) => DeliveryOutcome::Ignored,
            Err(e) => DeliveryOutcome::Rejected {
                reason: e.to_string(),
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Accepted { .. } => "accepted",
            DeliveryOutcome::Ignored => "ignored",
            DeliveryOutcome::Rejected { .. } => "rejected",
        }
    }
}

/// One inbound webhook request and what became of it
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub id: String,
    pub endpoint: String,
    pub provider: Provider,
    pub event_type: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

impl Delivery {
    pub fn new(
        endpoint: String,
        provider: Provider,
        event_type: Option<String>,
        outcome: DeliveryOutcome,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            endpoint,
            provider,
            event_type,
            received_at: Utc::now(),
            outcome,
        }
    }
}

/// Counters over every delivery seen since startup
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryCounts {
    pub accepted: u64,
    pub ignored: u64,
    pub rejected: u64,
}

/// Bounded in-memory log of recent deliveries, oldest evicted first
#[derive(Debug)]
pub struct DeliveryStore {
    deliveries: VecDeque<Delivery>,
    max_deliveries: usize,
    counts: DeliveryCounts,
}

impl DeliveryStore {
    pub fn new(max_deliveries: usize) -> Self {
        Self {
            // Configured maximum can be arbitrarily large; grow on demand past the default.
            deliveries: VecDeque::with_capacity(max_deliveries.min(DEFAULT_MAX_DELIVERIES)),
            max_deliveries,
            counts: DeliveryCounts::default(),
        }
    }

    /// Applies a new maximum, evicting the oldest entries that no longer fit
    pub fn set_max_deliveries(&mut self, max_deliveries: usize) {
        self.max_deliveries = max_deliveries;
        while self.deliveries.len() > max_deliveries {
            self.deliveries.pop_front();
        }
    }

    pub fn max_deliveries(&self) -> usize {
        self.max_deliveries
    }

    pub fn record(&mut self, delivery: Delivery) {
        match delivery.outcome {
            DeliveryOutcome::Accepted { .. } => self.counts.accepted += 1,
            DeliveryOutcome::Ignored => self.counts.ignored += 1,
            DeliveryOutcome::Rejected { .. } => self.counts.rejected += 1,
        }

        if self.max_deliveries == 0 {
            return;
        }
        while self.deliveries.len() >= self.max_deliveries {
            self.deliveries.pop_front();
        }
        self.deliveries.push_back(delivery);
    }

    /// Most recent deliveries first
    pub fn recent(&self, limit: usize) -> Vec<Delivery> {
        self.deliveries.iter().rev().take(limit).cloned().collect()
    }

    pub fn recent_for_endpoint(&self, endpoint: &str, limit: usize) -> Vec<Delivery> {
        self.deliveries
            .iter()
            .rev()
            .filter(|d| d.endpoint == endpoint)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Delivery> {
        self.deliveries.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn counts(&self) -> &DeliveryCounts {
        &self.counts
    }
}

impl Default for DeliveryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DELIVERIES)
    }
}
