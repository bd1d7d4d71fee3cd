//! # List Snapshot
//!
//! The data a PDF is rendered from, detached from where it came from (the
//! current list being saved, or a list from the history).

use chrono::{DateTime, Utc};

use panier_core::{Money, Product, ShoppingList};

/// One table row of the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLine {
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl ExportLine {
    pub fn total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// A shopping list ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub store_name: String,
    pub date: DateTime<Utc>,
    pub lines: Vec<ExportLine>,
}

impl ListSnapshot {
    /// Snapshot of the products currently in the list.
    pub fn from_products(store_name: &str, products: &[Product], date: DateTime<Utc>) -> Self {
        let lines = products
            .iter()
            .filter(|p| p.in_list && p.quantity > 0)
            .map(|p| ExportLine {
                name: p.name.clone(),
                unit_price: p.price(),
                quantity: p.quantity,
            })
            .collect();

        ListSnapshot {
            store_name: store_name.to_string(),
            date,
            lines,
        }
    }

    /// Snapshot of a saved list, priced as it was saved.
    pub fn from_saved_list(store_name: &str, list: &ShoppingList) -> Self {
        let lines = list
            .items
            .iter()
            .map(|item| ExportLine {
                name: item.product_name.clone(),
                unit_price: Money::from_cents(item.price_cents),
                quantity: item.quantity,
            })
            .collect();

        ListSnapshot {
            store_name: store_name.to_string(),
            date: list.created_at,
            lines,
        }
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(ExportLine::total).sum()
    }

    /// File name for this snapshot.
    pub fn file_name(&self) -> String {
        file_name(&self.store_name, self.date)
    }
}

/// `liste-courses-<store>-<YYYY-MM-DD>.pdf`
///
/// Characters that can't appear in a file name are replaced with `-`.
pub fn file_name(store_name: &str, date: DateTime<Utc>) -> String {
    let store: String = store_name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    format!("liste-courses-{}-{}.pdf", store, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use panier_core::ShoppingListItem;

    #[test]
    fn test_file_name() {
        let date = Utc.with_ymd_and_hms(2024, 3, 14, 23, 30, 0).unwrap();
        assert_eq!(file_name("Lidl", date), "liste-courses-Lidl-2024-03-14.pdf");
        assert_eq!(
            file_name("Marché A/B", date),
            "liste-courses-Marché A-B-2024-03-14.pdf"
        );
    }

    #[test]
    fn test_saved_list_uses_saved_prices() {
        let list = ShoppingList {
            id: 1,
            store_id: 1,
            user_id: "u".to_string(),
            total_cents: 360,
            week_number: 11,
            created_at: Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap(),
            items: vec![ShoppingListItem {
                id: 1,
                list_id: 1,
                product_id: 4,
                product_name: "Pain".to_string(),
                image_url: None,
                quantity: 3,
                price_cents: 120,
            }],
        };

        let snapshot = ListSnapshot::from_saved_list("Lidl", &list);
        assert_eq!(snapshot.total().cents(), 360);
        assert_eq!(snapshot.file_name(), "liste-courses-Lidl-2024-03-14.pdf");
    }
}
