//! Scoped settlement transactions.
//!
//! `with_transaction` acquires a transaction, runs the caller's closure against
//! it and commits only when the closure returns `Ok`. An `Err` rolls back
//! explicitly. A panic or a dropped future (deadline, client disconnect) drops
//! the transaction handle, and every backend rolls back on drop.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::error::ServiceError;
use crate::store::{SettlementStore, SettlementTx};

pub type BoxedTx = Box<dyn SettlementTx>;

/// Future returned by a transaction closure; it may borrow the transaction.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 't>>;

pub async fn with_transaction<S, T, F>(store: &S, work: F) -> Result<T, ServiceError>
where
    S: SettlementStore + ?Sized,
    F: for<'t> FnOnce(&'t mut BoxedTx) -> TxFuture<'t, T>,
{
    let mut tx = store.begin().await?;

    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback failed; the backend discards the transaction on drop");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InventoryStore, MemoryStore};
    use brewline_core::IngredientId;
    use brewline_inventory::NewInventoryItem;

    fn test_milk() -> NewInventoryItem {
        NewInventoryItem {
            name: "Whole Milk".to_string(),
            quantity: 500.0,
            unit: "ml".to_string(),
            reorder_threshold: Some(100.0),
        }
    }

    async fn stock(store: &MemoryStore, id: IngredientId) -> f64 {
        store
            .get_inventory(id)
            .await
            .unwrap()
            .expect("ingredient exists")
            .quantity()
    }

    #[tokio::test]
    async fn ok_commits_writes() {
        let store = MemoryStore::new();
        let milk = store.insert_inventory(test_milk()).await.unwrap().id_typed();

        let remaining = with_transaction(&store, move |tx| {
            Box::pin(async move {
                let row = tx.decrement_stock(milk, 200.0).await?;
                Ok(row.quantity())
            })
        })
        .await
        .unwrap();

        assert_eq!(remaining, 300.0);
        assert_eq!(stock(&store, milk).await, 300.0);
    }

    #[tokio::test]
    async fn err_rolls_back_writes() {
        let store = MemoryStore::new();
        let milk = store.insert_inventory(test_milk()).await.unwrap().id_typed();

        let result: Result<(), ServiceError> = with_transaction(&store, move |tx| {
            Box::pin(async move {
                tx.decrement_stock(milk, 200.0).await?;
                Err(ServiceError::Transaction("boom".to_string()))
            })
        })
        .await;

        assert_eq!(result, Err(ServiceError::Transaction("boom".to_string())));
        assert_eq!(stock(&store, milk).await, 500.0);
    }

    #[tokio::test]
    async fn panic_inside_closure_leaves_state_untouched() {
        let store = MemoryStore::new();
        let milk = store.insert_inventory(test_milk()).await.unwrap().id_typed();

        let task_store = store.clone();
        let handle = tokio::spawn(async move {
            let _: Result<(), ServiceError> = with_transaction(&task_store, move |tx| {
                Box::pin(async move {
                    tx.decrement_stock(milk, 200.0).await?;
                    panic!("settlement worker crashed");
                })
            })
            .await;
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(stock(&store, milk).await, 500.0);
    }
}
