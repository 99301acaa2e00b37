//! Stock items read from the relational source

pub mod repository;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use repository::SqliteStockItemRepository;

/// One row of the stock table, read once per sync pass
#[derive(Debug, Clone, PartialEq)]
pub struct StockItem {
    /// Unique, stable stock code; becomes the product number in Dynamics
    pub stock_code: String,
    pub retail_price_inc: Decimal,
    pub reseller_price_inc: Decimal,
}

/// Provider of the stock items to reconcile
#[async_trait]
pub trait StockItemSource: Send + Sync {
    /// All stock items, ordered by stock code
    async fn get_all_items(&self) -> Result<Vec<StockItem>>;
}
