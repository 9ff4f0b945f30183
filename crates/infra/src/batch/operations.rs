//! Stock and shopping list batch operations
//!
//! Payloads deserialize from the tool layer's JSON and map onto the Grocy
//! stock endpoints. Optional fields are omitted from the request body when
//! unset.

use chrono::NaiveDate;
use grocy_domain::{GatewayRequest, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::orchestrator::BatchOperation;

const DEFAULT_SHOPPING_LIST_ID: i64 = 1;

/// One product purchase to book into stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPurchase {
    pub product_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub best_before_date: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub location_id: Option<i64>,
}

/// One consumption (or spoilage) of stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockConsumption {
    pub product_id: i64,
    pub amount: f64,
    #[serde(default)]
    pub spoiled: bool,
    #[serde(default)]
    pub location_id: Option<i64>,
}

/// Absolute stock level for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCorrection {
    pub product_id: i64,
    pub new_amount: f64,
    #[serde(default)]
    pub best_before_date: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

/// A product to put on a shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListEntry {
    pub product_id: i64,
    pub amount: f64,
    #[serde(default = "default_shopping_list_id")]
    pub shopping_list_id: i64,
    #[serde(default)]
    pub note: Option<String>,
}

const fn default_shopping_list_id() -> i64 {
    DEFAULT_SHOPPING_LIST_ID
}

/// `POST stock/products/{id}/add`
#[derive(Debug, Clone, Copy, Default)]
pub struct AddStock;

/// `POST stock/products/{id}/consume`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumeStock;

/// `POST stock/products/{id}/inventory`
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryProduct;

/// `POST objects/shopping_list`
#[derive(Debug, Clone, Copy, Default)]
pub struct AddShoppingListItem;

impl BatchOperation for AddStock {
    type Item = StockPurchase;

    fn name(&self) -> &'static str {
        "add_stock"
    }

    fn validate(&self, item: &StockPurchase) -> Result<(), String> {
        check_product_id(item.product_id)?;
        check_positive("amount", item.amount)?;
        check_date(item.best_before_date.as_deref())?;
        check_price(item.price)?;
        check_location(item.location_id)
    }

    fn to_request(&self, item: &StockPurchase) -> GatewayRequest {
        let mut body = Map::new();
        body.insert("amount".into(), json!(item.amount));
        body.insert("transaction_type".into(), json!("purchase"));
        insert_opt(&mut body, "best_before_date", item.best_before_date.as_ref());
        insert_opt(&mut body, "price", item.price.as_ref());
        insert_opt(&mut body, "location_id", item.location_id.as_ref());

        GatewayRequest::post(format!("stock/products/{}/add", item.product_id), Value::Object(body))
    }

    fn summary_parts(&self) -> (&'static str, &'static str) {
        ("Added", "to stock")
    }
}

impl BatchOperation for ConsumeStock {
    type Item = StockConsumption;

    fn name(&self) -> &'static str {
        "consume_stock"
    }

    fn validate(&self, item: &StockConsumption) -> Result<(), String> {
        check_product_id(item.product_id)?;
        check_positive("amount", item.amount)?;
        check_location(item.location_id)
    }

    fn to_request(&self, item: &StockConsumption) -> GatewayRequest {
        let mut body = Map::new();
        body.insert("amount".into(), json!(item.amount));
        body.insert("transaction_type".into(), json!("consume"));
        body.insert("spoiled".into(), json!(item.spoiled));
        insert_opt(&mut body, "location_id", item.location_id.as_ref());

        GatewayRequest::post(
            format!("stock/products/{}/consume", item.product_id),
            Value::Object(body),
        )
    }

    fn summary_parts(&self) -> (&'static str, &'static str) {
        ("Consumed", "from stock")
    }
}

impl BatchOperation for InventoryProduct {
    type Item = InventoryCorrection;

    fn name(&self) -> &'static str {
        "inventory_product"
    }

    fn validate(&self, item: &InventoryCorrection) -> Result<(), String> {
        check_product_id(item.product_id)?;
        if !item.new_amount.is_finite() || item.new_amount < 0.0 {
            return Err(format!("new_amount must be zero or positive, got {}", item.new_amount));
        }
        check_date(item.best_before_date.as_deref())?;
        check_price(item.price)?;
        check_location(item.location_id)
    }

    fn to_request(&self, item: &InventoryCorrection) -> GatewayRequest {
        let mut body = Map::new();
        body.insert("new_amount".into(), json!(item.new_amount));
        insert_opt(&mut body, "best_before_date", item.best_before_date.as_ref());
        insert_opt(&mut body, "location_id", item.location_id.as_ref());
        insert_opt(&mut body, "price", item.price.as_ref());
        insert_opt(&mut body, "note", item.note.as_ref().filter(|n| !n.is_empty()));

        GatewayRequest::post(
            format!("stock/products/{}/inventory", item.product_id),
            Value::Object(body),
        )
    }

    fn summary_parts(&self) -> (&'static str, &'static str) {
        ("Inventoried", "")
    }
}

impl BatchOperation for AddShoppingListItem {
    type Item = ShoppingListEntry;

    fn name(&self) -> &'static str {
        "add_shopping_list_item"
    }

    fn validate(&self, item: &ShoppingListEntry) -> Result<(), String> {
        check_product_id(item.product_id)?;
        check_positive("amount", item.amount)?;
        if item.shopping_list_id <= 0 {
            return Err(format!("shopping_list_id must be positive, got {}", item.shopping_list_id));
        }
        Ok(())
    }

    fn to_request(&self, item: &ShoppingListEntry) -> GatewayRequest {
        let mut body = Map::new();
        body.insert("product_id".into(), json!(item.product_id));
        body.insert("amount".into(), json!(item.amount));
        body.insert("shopping_list_id".into(), json!(item.shopping_list_id));
        insert_opt(&mut body, "note", item.note.as_ref().filter(|n| !n.is_empty()));

        GatewayRequest::new(Method::Post, "objects/shopping_list").with_body(Value::Object(body))
    }

    fn summary_parts(&self) -> (&'static str, &'static str) {
        ("Added", "to the shopping list")
    }
}

fn insert_opt<T: Serialize>(body: &mut Map<String, Value>, key: &str, value: Option<&T>) {
    if let Some(value) = value {
        body.insert(key.to_string(), json!(value));
    }
}

fn check_product_id(product_id: i64) -> Result<(), String> {
    if product_id > 0 {
        Ok(())
    } else {
        Err(format!("product_id must be positive, got {product_id}"))
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{field} must be positive, got {value}"))
    }
}

fn check_price(price: Option<f64>) -> Result<(), String> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(format!("price must not be negative, got {p}")),
        _ => Ok(()),
    }
}

fn check_location(location_id: Option<i64>) -> Result<(), String> {
    match location_id {
        Some(id) if id <= 0 => Err(format!("location_id must be positive, got {id}")),
        _ => Ok(()),
    }
}

fn check_date(date: Option<&str>) -> Result<(), String> {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| format!("best_before_date must be YYYY-MM-DD, got {raw:?}")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(product_id: i64, amount: f64) -> StockPurchase {
        StockPurchase { product_id, amount, best_before_date: None, price: None, location_id: None }
    }

    #[test]
    fn test_add_stock_request() {
        let item = StockPurchase {
            best_before_date: Some("2026-11-02".into()),
            price: Some(1.99),
            ..purchase(12, 2.0)
        };
        assert!(AddStock.validate(&item).is_ok());

        let request = AddStock.to_request(&item);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "stock/products/12/add");
        assert_eq!(
            request.body.unwrap(),
            json!({
                "amount": 2.0,
                "transaction_type": "purchase",
                "best_before_date": "2026-11-02",
                "price": 1.99
            })
        );
    }

    #[test]
    fn test_add_stock_validation() {
        assert!(AddStock.validate(&purchase(0, 1.0)).unwrap_err().contains("product_id"));
        assert!(AddStock.validate(&purchase(1, 0.0)).unwrap_err().contains("amount"));
        assert!(AddStock.validate(&purchase(1, f64::NAN)).is_err());

        let bad_date = StockPurchase { best_before_date: Some("02.11.2026".into()), ..purchase(1, 1.0) };
        assert!(AddStock.validate(&bad_date).unwrap_err().contains("YYYY-MM-DD"));

        let bad_price = StockPurchase { price: Some(-1.0), ..purchase(1, 1.0) };
        assert!(AddStock.validate(&bad_price).unwrap_err().contains("price"));
    }

    #[test]
    fn test_consume_request() {
        let item = StockConsumption { product_id: 4, amount: 1.5, spoiled: true, location_id: Some(2) };
        let request = ConsumeStock.to_request(&item);

        assert_eq!(request.path, "stock/products/4/consume");
        assert_eq!(
            request.body.unwrap(),
            json!({"amount": 1.5, "transaction_type": "consume", "spoiled": true, "location_id": 2})
        );
    }

    #[test]
    fn test_inventory_allows_zero_but_not_negative() {
        let mut item = InventoryCorrection {
            product_id: 3,
            new_amount: 0.0,
            best_before_date: None,
            location_id: None,
            price: None,
            note: Some("counted".into()),
        };
        assert!(InventoryProduct.validate(&item).is_ok());
        assert_eq!(
            InventoryProduct.to_request(&item).body.unwrap(),
            json!({"new_amount": 0.0, "note": "counted"})
        );

        item.new_amount = -1.0;
        assert!(InventoryProduct.validate(&item).is_err());
    }

    #[test]
    fn test_shopping_list_defaults() {
        let item: ShoppingListEntry =
            serde_json::from_value(json!({"product_id": 9, "amount": 3})).unwrap();
        assert_eq!(item.shopping_list_id, 1);

        let request = AddShoppingListItem.to_request(&item);
        assert_eq!(request.path, "objects/shopping_list");
        assert_eq!(
            request.body.unwrap(),
            json!({"product_id": 9, "amount": 3.0, "shopping_list_id": 1})
        );
    }
}
