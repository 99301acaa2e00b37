//! FetchXML document builder and the canned lookups used by the sync job

use std::fmt::Display;

use quick_xml::escape::escape;
use uuid::Uuid;

/// Outer/inner join to a related entity inside a FetchXML query
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEntity {
    pub name: String,
    pub from: String,
    pub to: String,
    pub alias: String,
    pub outer: bool,
    pub attributes: Vec<String>,
}

impl LinkEntity {
    /// Left outer join on `from = to`
    pub fn outer(name: &str, from: &str, to: &str, alias: &str) -> Self {
        Self {
            name: name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            alias: alias.to_string(),
            outer: true,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.attributes.push(name.to_string());
        self
    }

    fn write(&self, out: &mut String) {
        let link_type = if self.outer { "outer" } else { "inner" };
        out.push_str(&format!(
            "<link-entity name='{}' from='{}' to='{}' link-type='{}' alias='{}'>",
            self.name, self.from, self.to, link_type, self.alias
        ));
        for attribute in &self.attributes {
            out.push_str(&format!("<attribute name='{}'/>", attribute));
        }
        out.push_str("</link-entity>");
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    attribute: String,
    value: String,
}

/// Fluent builder for single-entity FetchXML queries.
///
/// Condition values are XML-escaped as they are added, so codes containing
/// `&`, `'` or `<` stay inside their attribute. URL encoding is left to the
/// HTTP client, which encodes the finished document as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchXmlBuilder {
    entity: String,
    attributes: Vec<String>,
    conditions: Vec<Condition>,
    links: Vec<LinkEntity>,
}

impl FetchXmlBuilder {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            attributes: Vec::new(),
            conditions: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Restrict the returned attributes; empty names are ignored and an
    /// empty selection means all attributes
    pub fn attributes(mut self, columns: &[&str]) -> Self {
        self.attributes.extend(
            columns
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.to_string()),
        );
        self
    }

    /// Add an `eq` condition (conditions are AND-ed)
    pub fn filter_eq(mut self, attribute: &str, value: impl Display) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.to_string(),
            value: escape(value.to_string().as_str()).into_owned(),
        });
        self
    }

    pub fn link(mut self, link: LinkEntity) -> Self {
        self.links.push(link);
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::from("<fetch mapping='logical'>");
        out.push_str(&format!("<entity name='{}'>", self.entity));

        if self.attributes.is_empty() {
            out.push_str("<all-attributes/>");
        } else {
            for attribute in &self.attributes {
                out.push_str(&format!("<attribute name='{}'/>", attribute));
            }
        }

        if !self.conditions.is_empty() {
            out.push_str("<filter>");
            for condition in &self.conditions {
                out.push_str(&format!(
                    "<condition attribute='{}' operator='eq' value='{}'/>",
                    condition.attribute, condition.value
                ));
            }
            out.push_str("</filter>");
        }

        for link in &self.links {
            link.write(&mut out);
        }

        out.push_str("</entity></fetch>");
        out
    }
}

/// Product whose `productnumber` equals the stock code
pub fn product_by_number(product_number: &str, columns: &[&str]) -> String {
    FetchXmlBuilder::new("product")
        .attributes(columns)
        .filter_eq("productnumber", product_number)
        .build()
}

/// Product by stock code, joined to its item category code (aliased `category`)
pub fn product_with_category_by_number(product_number: &str, columns: &[&str]) -> String {
    FetchXmlBuilder::new("product")
        .attributes(columns)
        .filter_eq("productnumber", product_number)
        .link(
            LinkEntity::outer(
                "dict_itemcategory",
                "dict_itemcategoryid",
                "dict_itemcategoryid",
                "category",
            )
            .attribute("dict_category"),
        )
        .build()
}

/// Price list item keyed by (product, price list)
pub fn price_level_by_product(product_id: Uuid, price_level_id: Uuid, columns: &[&str]) -> String {
    FetchXmlBuilder::new("productpricelevel")
        .attributes(columns)
        .filter_eq("productid", product_id)
        .filter_eq("pricelevelid", price_level_id)
        .build()
}

/// Every item category
pub fn item_categories(columns: &[&str]) -> String {
    FetchXmlBuilder::new("dict_itemcategory")
        .attributes(columns)
        .build()
}

/// Item category by its category code
pub fn item_category_by_code(category_code: &str, columns: &[&str]) -> String {
    FetchXmlBuilder::new("dict_itemcategory")
        .attributes(columns)
        .filter_eq("dict_category", category_code)
        .build()
}
