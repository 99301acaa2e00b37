//! Entity set names and OData header names used against the Dynamics 365 Web API

/// Plural entity set names (the `{collection}` segment of a resource URL)
pub mod entity_sets {
    pub const PRODUCTS: &str = "products";
    pub const UOM_SCHEDULES: &str = "uomschedules";
    pub const UOMS: &str = "uoms";
    pub const PRODUCT_PRICE_LEVELS: &str = "productpricelevels";
    pub const ITEM_CATEGORIES: &str = "dict_itemcategories";
    pub const PRICE_LEVELS: &str = "pricelevels";
}

pub mod headers {
    pub const ODATA_MAX_VERSION: &str = "OData-MaxVersion";
    pub const ODATA_VERSION: &str = "OData-Version";
    /// Carries the URL of a newly created record, e.g. `.../products(<guid>)`
    pub const ODATA_ENTITY_ID: &str = "OData-EntityId";
    pub const ODATA_VERSION_VALUE: &str = "4.0";
}

/// Query string parameter names
pub mod params {
    pub const SELECT: &str = "$select";
    pub const FETCH_XML: &str = "fetchXml";
}
