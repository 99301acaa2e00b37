//! Dynamics 365 entities written by the stock sync

pub mod item_category;
pub mod price_level;
pub mod product;

pub use item_category::ItemCategory;
pub use price_level::ProductPriceLevel;
pub use product::Product;
