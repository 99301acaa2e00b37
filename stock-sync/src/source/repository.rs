//! SQLite-backed stock item repository

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::{StockItem, StockItemSource};

#[derive(Debug, Clone)]
pub struct SqliteStockItemRepository {
    pool: SqlitePool,
}

impl SqliteStockItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `connection_string` (e.g. `sqlite://stock.db`)
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(connection_string)
            .await
            .with_context(|| format!("Failed to connect to stock database '{}'", connection_string))?;
        Ok(Self::new(pool))
    }
}

fn parse_price(raw: Option<String>, column: &str, stock_code: &str) -> Result<Decimal> {
    let text = raw.with_context(|| format!("{} is NULL for stock item {}", column, stock_code))?;
    Decimal::from_str(text.trim())
        .or_else(|_| Decimal::from_scientific(text.trim()))
        .with_context(|| format!("Invalid {} '{}' for stock item {}", column, text, stock_code))
}

#[async_trait]
impl StockItemSource for SqliteStockItemRepository {
    async fn get_all_items(&self) -> Result<Vec<StockItem>> {
        // Prices are read as text so they reach Decimal without a float round trip
        let rows = sqlx::query(
            r#"
            SELECT StockCode,
                   CAST(RetailPriceInc AS TEXT) AS RetailPriceInc,
                   CAST(ResellerPriceInc AS TEXT) AS ResellerPriceInc
            FROM StockItems
            ORDER BY StockCode
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read stock items")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let stock_code: String = row.try_get("StockCode")?;
            let retail: Option<String> = row.try_get("RetailPriceInc")?;
            let reseller: Option<String> = row.try_get("ResellerPriceInc")?;
            let prices = parse_price(retail, "RetailPriceInc", &stock_code).and_then(|retail| {
                parse_price(reseller, "ResellerPriceInc", &stock_code).map(|reseller| (retail, reseller))
            });

            // A row without usable prices is left out of the pass rather than written as zero
            match prices {
                Ok((retail_price_inc, reseller_price_inc)) => items.push(StockItem {
                    stock_code,
                    retail_price_inc,
                    reseller_price_inc,
                }),
                Err(err) => log::error!("Skipping stock item {}: {:#}", stock_code, err),
            }
        }

        log::debug!("{} stock items retrieved", items.len());
        Ok(items)
    }
}
