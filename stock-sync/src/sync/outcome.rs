//! Per-record outcomes and pass summaries

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::CrmError;

/// Step of the per-item state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    LocateProduct,
    UpsertProduct,
    LocatePriceLevel,
    UpsertPriceLevel,
    ActivateProduct,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncStage::LocateProduct => "locate product",
            SyncStage::UpsertProduct => "upsert product",
            SyncStage::LocatePriceLevel => "locate price level",
            SyncStage::UpsertPriceLevel => "upsert price level",
            SyncStage::ActivateProduct => "activate product",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceAction {
    Created,
    Updated,
    Unchanged,
}

/// Result of reconciling one stock item. Failures are final for the pass;
/// the next pass picks the item up again from whatever state was reached.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Synced {
        stock_code: String,
        product_id: Uuid,
        price_level_id: Uuid,
        product: ProductAction,
        price: PriceAction,
    },
    Failed {
        stock_code: String,
        stage: SyncStage,
        /// Known once the product has been located or created
        product_id: Option<Uuid>,
        error: CrmError,
    },
}

impl RecordOutcome {
    pub fn stock_code(&self) -> &str {
        match self {
            RecordOutcome::Synced { stock_code, .. } => stock_code,
            RecordOutcome::Failed { stock_code, .. } => stock_code,
        }
    }

    /// Id of the resulting product, if the item synced
    pub fn product_id(&self) -> Option<Uuid> {
        match self {
            RecordOutcome::Synced { product_id, .. } => Some(*product_id),
            RecordOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecordOutcome::Synced { .. })
    }
}

/// Summary of one pass over the stock table
#[derive(Debug, Clone)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when the source could not be read; no items were processed
    pub source_error: Option<String>,
    pub outcomes: Vec<RecordOutcome>,
}

impl PassReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            source_error: None,
            outcomes: Vec::new(),
        }
    }

    fn count_synced(&self, pred: impl Fn(ProductAction, PriceAction) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|o| match o {
                RecordOutcome::Synced { product, price, .. } => pred(*product, *price),
                RecordOutcome::Failed { .. } => false,
            })
            .count()
    }

    pub fn products_created(&self) -> usize {
        self.count_synced(|product, _| product == ProductAction::Created)
    }

    pub fn products_updated(&self) -> usize {
        self.count_synced(|product, _| product == ProductAction::Updated)
    }

    pub fn prices_written(&self) -> usize {
        self.count_synced(|_, price| price != PriceAction::Unchanged)
    }

    pub fn prices_unchanged(&self) -> usize {
        self.count_synced(|_, price| price == PriceAction::Unchanged)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
