//! Stock ledger: the only code that changes a product's stock counter.
//!
//! Both operations run inside the caller's transaction. Product rows are
//! locked through [`Transaction::lock_products`], which always locks in
//! ascending product id order, so two multi-item orders touching the same
//! products cannot deadlock.

use domain::{Order, ProductId};
use store::{StoreError, Transaction};
use thiserror::Error;

/// Errors from a stock debit.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not enough '{product_name}'. Available: {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
        requested: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Debits stock for every item of `order`.
///
/// All rows are checked before any is written, and the caller rolls back the
/// transaction on error, so a debit is all-or-nothing.
#[tracing::instrument(skip(tx, order), fields(order_id = %order.id()))]
pub async fn debit(tx: &mut dyn Transaction, order: &Order) -> Result<(), LedgerError> {
    let quantities = order.quantities_by_product();
    let ids: Vec<ProductId> = quantities.keys().cloned().collect();
    let products = tx.lock_products(&ids).await?;

    let mut updates = Vec::with_capacity(products.len());
    for product in &products {
        let requested = quantities.get(&product.id).copied().unwrap_or(0);
        let Some(remaining) = product.stock.checked_sub(requested) else {
            tracing::info!(
                product_id = %product.id,
                available = product.stock,
                requested,
                "insufficient stock"
            );
            return Err(LedgerError::InsufficientStock {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                available: product.stock,
                requested,
            });
        };
        updates.push((&product.id, remaining));
    }

    for (id, remaining) in updates {
        tx.write_stock(id, remaining).await?;
    }

    let units: u64 = quantities.values().map(|&q| u64::from(q)).sum();
    metrics::counter!("stock_debited_units_total").increment(units);
    tracing::debug!(units, products = products.len(), "stock debited");
    Ok(())
}

/// Credits stock back for every item of `order`. No upper bound applies.
#[tracing::instrument(skip(tx, order), fields(order_id = %order.id()))]
pub async fn credit(tx: &mut dyn Transaction, order: &Order) -> Result<(), StoreError> {
    let quantities = order.quantities_by_product();
    let ids: Vec<ProductId> = quantities.keys().cloned().collect();
    let products = tx.lock_products(&ids).await?;

    for product in &products {
        let quantity = quantities.get(&product.id).copied().unwrap_or(0);
        tx.write_stock(&product.id, product.stock.saturating_add(quantity))
            .await?;
    }

    let units: u64 = quantities.values().map(|&q| u64::from(q)).sum();
    metrics::counter!("stock_credited_units_total").increment(units);
    tracing::debug!(units, products = products.len(), "stock credited");
    Ok(())
}
