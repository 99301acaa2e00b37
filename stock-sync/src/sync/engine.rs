//! Per-item reconciliation state machine
//!
//! For each stock item, in order:
//! 1. locate the product by stock code
//! 2. create it, or update the existing one
//! 3. locate its price list item on the default price list
//! 4. create it, update its amount, or leave it alone when unchanged
//! 5. set the product active
//!
//! The first failing step ends the item for this pass. Completed steps are
//! not rolled back; the next pass resumes from step 1 and finds whatever was
//! already written.

use chrono::Utc;
use uuid::Uuid;

use crate::api::query::fetchxml;
use crate::api::{CrmEntity, CrmError, CrmResult, DynamicsClient};
use crate::config::SalesOptions;
use crate::entities::{Product, ProductPriceLevel};
use crate::source::{StockItem, StockItemSource};

use super::outcome::{PassReport, PriceAction, ProductAction, RecordOutcome, SyncStage};

/// Decimal places written to price list item amounts
const AMOUNT_SCALE: u32 = 2;

pub struct StockSync<S> {
    source: S,
    client: DynamicsClient,
    sales: SalesOptions,
}

impl<S: StockItemSource> StockSync<S> {
    pub fn new(source: S, client: DynamicsClient, sales: SalesOptions) -> Self {
        Self {
            source,
            client,
            sales,
        }
    }

    /// Run one full pass. Never fails: a source error yields an empty
    /// report with `source_error` set, item failures are recorded per item.
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::new(Utc::now());
        log::info!("Stock item sync started at {}", report.started_at);

        let items = match self.source.get_all_items().await {
            Ok(items) => items,
            Err(err) => {
                log::error!("Failed to read stock items, nothing to sync: {:#}", err);
                report.source_error = Some(format!("{:#}", err));
                report.finished_at = Utc::now();
                return report;
            }
        };

        for item in &items {
            report.outcomes.push(self.sync_item(item).await);
        }

        report.finished_at = Utc::now();
        log::info!(
            "Stock item sync finished in {}ms: {} items, {} products created, {} updated, {} prices written, {} unchanged, {} failed",
            (report.finished_at - report.started_at).num_milliseconds(),
            items.len(),
            report.products_created(),
            report.products_updated(),
            report.prices_written(),
            report.prices_unchanged(),
            report.failed()
        );
        report
    }

    /// Reconcile a single stock item
    pub async fn sync_item(&self, item: &StockItem) -> RecordOutcome {
        log::debug!("Syncing stock item {}", item.stock_code);

        let query = fetchxml::product_by_number(&item.stock_code, &[]);
        let existing = match self
            .client
            .get_by_fetchxml::<Product>(Product::ENTITY_SET, &query)
            .await
        {
            Ok(existing) => existing,
            Err(error) => return self.failed(item, SyncStage::LocateProduct, None, error),
        };

        let (product_id, product_action) = match self.upsert_product(existing, item).await {
            Ok(result) => result,
            Err(error) => return self.failed(item, SyncStage::UpsertProduct, None, error),
        };

        let query = fetchxml::price_level_by_product(product_id, self.sales.default_price_list, &[]);
        let existing_price = match self
            .client
            .get_by_fetchxml::<ProductPriceLevel>(ProductPriceLevel::ENTITY_SET, &query)
            .await
        {
            Ok(existing) => existing,
            Err(error) => {
                return self.failed(item, SyncStage::LocatePriceLevel, Some(product_id), error);
            }
        };

        let (price_level_id, price_action) =
            match self.upsert_price_level(existing_price, product_id, item).await {
                Ok(result) => result,
                Err(error) => {
                    return self.failed(item, SyncStage::UpsertPriceLevel, Some(product_id), error);
                }
            };

        if let Err(error) = self
            .client
            .update(Product::ENTITY_SET, &Product::activation(), product_id)
            .await
        {
            return self.failed(item, SyncStage::ActivateProduct, Some(product_id), error);
        }
        log::debug!("Product {} set to active", product_id);

        RecordOutcome::Synced {
            stock_code: item.stock_code.clone(),
            product_id,
            price_level_id,
            product: product_action,
            price: price_action,
        }
    }

    fn failed(
        &self,
        item: &StockItem,
        stage: SyncStage,
        product_id: Option<Uuid>,
        error: CrmError,
    ) -> RecordOutcome {
        log::error!(
            "Failed to sync stock item {} at '{}' (product={}): [{}] {}",
            item.stock_code,
            stage,
            product_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            error.kind(),
            error
        );
        RecordOutcome::Failed {
            stock_code: item.stock_code.clone(),
            stage,
            product_id,
            error,
        }
    }

    async fn upsert_product(
        &self,
        existing: Option<Product>,
        item: &StockItem,
    ) -> CrmResult<(Uuid, ProductAction)> {
        match existing {
            None => {
                let id = self
                    .client
                    .create(Product::ENTITY_SET, &self.new_product(item))
                    .await?;
                log::debug!("Product {} created for stock item {}", id, item.stock_code);
                Ok((id, ProductAction::Created))
            }
            Some(existing) => {
                let id = located_id(&existing, &item.stock_code)?;
                let id = self
                    .client
                    .update(Product::ENTITY_SET, &self.product_update(&existing, item), id)
                    .await?;
                log::debug!("Product {} updated for stock item {}", id, item.stock_code);
                Ok((id, ProductAction::Updated))
            }
        }
    }

    async fn upsert_price_level(
        &self,
        existing: Option<ProductPriceLevel>,
        product_id: Uuid,
        item: &StockItem,
    ) -> CrmResult<(Uuid, PriceAction)> {
        let rounded = item.reseller_price_inc.round_dp(AMOUNT_SCALE);

        match existing {
            None => {
                let price_level = ProductPriceLevel {
                    id: None,
                    amount: Some(rounded),
                    product_id: Some(product_id),
                    default_uom_id: Some(self.sales.uom_id),
                    default_price_list: Some(self.sales.default_price_list),
                };
                let id = self
                    .client
                    .create(ProductPriceLevel::ENTITY_SET, &price_level)
                    .await?;
                log::debug!("Price for product {} created ({})", product_id, rounded);
                Ok((id, PriceAction::Created))
            }
            Some(existing) => {
                let id = located_id(&existing, &item.stock_code)?;

                // Compared against the unrounded source price; only the write is rounded
                if existing.amount == Some(item.reseller_price_inc) {
                    log::info!("Price for product {} unchanged", product_id);
                    return Ok((id, PriceAction::Unchanged));
                }

                let patch = ProductPriceLevel {
                    amount: Some(rounded),
                    ..Default::default()
                };
                let id = self
                    .client
                    .update(ProductPriceLevel::ENTITY_SET, &patch, id)
                    .await?;
                log::debug!("Price for product {} updated ({})", product_id, rounded);
                Ok((id, PriceAction::Updated))
            }
        }
    }

    fn new_product(&self, item: &StockItem) -> Product {
        Product {
            product_number: Some(item.stock_code.clone()),
            name: Some(item.stock_code.clone()),
            current_cost: Some(item.retail_price_inc),
            default_uom_schedule_id: Some(self.sales.uom_schedule_id),
            default_uom_id: Some(self.sales.uom_id),
            ..Default::default()
        }
    }

    /// Existing products keep their name and cost; only the stock code and
    /// any missing unit references are written
    fn product_update(&self, existing: &Product, item: &StockItem) -> Product {
        Product {
            product_number: Some(item.stock_code.clone()),
            default_uom_schedule_id: existing
                .default_uom_schedule_id
                .or(Some(self.sales.uom_schedule_id)),
            default_uom_id: existing.default_uom_id.or(Some(self.sales.uom_id)),
            ..Default::default()
        }
    }
}

/// Id of a record found by query; a match without its primary key is a protocol violation
fn located_id<T: CrmEntity>(record: &T, stock_code: &str) -> CrmResult<Uuid> {
    record.id().ok_or_else(|| {
        CrmError::Protocol(format!(
            "{} for stock item {} was returned without {}",
            T::LOGICAL_NAME,
            stock_code,
            T::ID_ATTRIBUTE
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StaticTokenProvider;
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoItems;

    #[async_trait]
    impl StockItemSource for NoItems {
        async fn get_all_items(&self) -> Result<Vec<StockItem>> {
            anyhow::bail!("database is down")
        }
    }

    fn sales() -> SalesOptions {
        SalesOptions {
            uom_schedule_id: Uuid::parse_str("3fa85f64-5717-4562-b3fc-2c963f66afa6").unwrap(),
            uom_id: Uuid::parse_str("0b9a3c61-69f0-4a5b-8b5e-1f1f6f0c2d11").unwrap(),
            default_price_list: Uuid::parse_str("7c9e6679-7425-40de-944b-e07fc1f90ae7").unwrap(),
        }
    }

    fn sync() -> StockSync<NoItems> {
        let client = DynamicsClient::new(
            "http://127.0.0.1:9/api/data/v9.2",
            Arc::new(StaticTokenProvider::new("t")),
            Duration::from_secs(1),
        )
        .unwrap();
        StockSync::new(NoItems, client, sales())
    }

    fn item() -> StockItem {
        StockItem {
            stock_code: "STK-001".to_string(),
            retail_price_inc: Decimal::from_str("19.99").unwrap(),
            reseller_price_inc: Decimal::from_str("14.505").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_source_failure_yields_empty_report() {
        let report = sync().run_pass().await;

        assert!(report.outcomes.is_empty());
        assert!(report.source_error.unwrap().contains("database is down"));
    }

    #[test]
    fn test_new_product_fields() {
        let product = sync().new_product(&item());

        assert_eq!(product.id, None);
        assert_eq!(product.product_number.as_deref(), Some("STK-001"));
        assert_eq!(product.name.as_deref(), Some("STK-001"));
        assert_eq!(product.current_cost, Some(Decimal::from_str("19.99").unwrap()));
        assert_eq!(product.default_uom_id, Some(sales().uom_id));
        assert_eq!(product.default_uom_schedule_id, Some(sales().uom_schedule_id));
    }

    #[test]
    fn test_product_update_keeps_name_and_cost() {
        let other_uom = Uuid::new_v4();
        let existing = Product {
            id: Some(Uuid::new_v4()),
            name: Some("Pretty name".to_string()),
            current_cost: Some(Decimal::from(5)),
            default_uom_id: Some(other_uom),
            ..Default::default()
        };

        let patch = sync().product_update(&existing, &item());

        assert_eq!(patch.name, None);
        assert_eq!(patch.current_cost, None);
        assert_eq!(patch.id, None);
        assert_eq!(patch.default_uom_id, Some(other_uom));
        assert_eq!(patch.default_uom_schedule_id, Some(sales().uom_schedule_id));
    }

    #[test]
    fn test_located_id_requires_primary_key() {
        let id = Uuid::new_v4();
        let found = ProductPriceLevel {
            id: Some(id),
            ..Default::default()
        };
        assert_eq!(located_id(&found, "STK-001"), Ok(id));

        let err = located_id(&ProductPriceLevel::default(), "STK-001").unwrap_err();
        assert_eq!(
            err,
            CrmError::Protocol(
                "productpricelevel for stock item STK-001 was returned without productpricelevelid"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_amount_rounding_is_bankers() {
        assert_eq!(
            Decimal::from_str("14.505").unwrap().round_dp(AMOUNT_SCALE),
            Decimal::from_str("14.50").unwrap()
        );
        assert_eq!(
            Decimal::from_str("14.515").unwrap().round_dp(AMOUNT_SCALE),
            Decimal::from_str("14.52").unwrap()
        );
    }
}
