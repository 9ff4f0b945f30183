//! Batch execution
//!
//! [`BatchOrchestrator`] fans a list of items out through the gateway;
//! [`operations`] holds the concrete stock and shopping list batches.

pub mod operations;
pub mod orchestrator;

pub use operations::{
    AddShoppingListItem, AddStock, ConsumeStock, InventoryCorrection, InventoryProduct,
    ShoppingListEntry, StockConsumption, StockPurchase,
};
pub use orchestrator::{BatchOperation, BatchOrchestrator};
