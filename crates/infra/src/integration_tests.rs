//! Integration tests for the settlement pipeline over the in-memory backend.
//!
//! Tests: Order Service → Settlement Engine → Storage (locks, writes, commit)
//!
//! Verifies:
//! - Recipe quantities are multiplied by ordered quantity and summed per ingredient
//! - A refused or failed settlement leaves inventory and order status untouched
//! - Concurrent closes neither double-deduct nor lose updates
//! - Bulk batches absorb only stock shortfalls

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use brewline_core::{IngredientId, MenuItemId, OrderId};
    use brewline_inventory::NewInventoryItem;
    use brewline_menu::{NewMenuItem, RecipeLine};
    use brewline_orders::{
        BulkOutcome, NewOrder, OrderLineRequest, OrderStatus, PricedOrder, SpecialInstructions,
        REASON_INSUFFICIENT_INVENTORY,
    };

    use crate::error::ServiceError;
    use crate::services::Services;
    use crate::store::{Fault, InventoryStore, MemoryStore, OrderStore};

    struct Shop {
        store: MemoryStore,
        services: Services,
        milk: IngredientId,
        coffee: IngredientId,
        latte: MenuItemId,
    }

    fn test_ingredient(name: &str, quantity: f64, threshold: Option<f64>) -> NewInventoryItem {
        NewInventoryItem {
            name: name.to_string(),
            quantity,
            unit: "unit".to_string(),
            reorder_threshold: threshold,
        }
    }

    fn test_order(customer: &str, product: MenuItemId, quantity: i64) -> NewOrder {
        NewOrder {
            customer_name: customer.to_string(),
            special_instructions: SpecialInstructions::default(),
            items: vec![OrderLineRequest {
                product_id: product,
                quantity,
            }],
        }
    }

    /// Milk and coffee stock plus a latte (200 milk, 18 coffee per cup).
    async fn setup(milk: f64, coffee: f64, deadline: Option<Duration>) -> Shop {
        let store = MemoryStore::new();
        let services = Services::new(Arc::new(store.clone()), deadline);

        let milk = services
            .inventory
            .create(test_ingredient("Milk", milk, Some(100.0)))
            .await
            .unwrap()
            .id_typed();
        let coffee = services
            .inventory
            .create(test_ingredient("Coffee Beans", coffee, Some(5.0)))
            .await
            .unwrap()
            .id_typed();
        let latte = services
            .menu
            .create(NewMenuItem {
                name: "Latte".to_string(),
                description: "Espresso with steamed milk".to_string(),
                price: 4.5,
                categories: vec!["coffee".to_string()],
                ingredients: vec![
                    RecipeLine {
                        ingredient_id: milk,
                        quantity: 200.0,
                    },
                    RecipeLine {
                        ingredient_id: coffee,
                        quantity: 18.0,
                    },
                ],
                available: true,
            })
            .await
            .unwrap()
            .id_typed();

        Shop {
            store,
            services,
            milk,
            coffee,
            latte,
        }
    }

    async fn stock(shop: &Shop, id: IngredientId) -> f64 {
        shop.services.inventory.get(id).await.unwrap().quantity()
    }

    async fn status(shop: &Shop, id: OrderId) -> OrderStatus {
        shop.services.orders.get(id).await.unwrap().status()
    }

    #[tokio::test]
    async fn close_deducts_recipe_times_quantity() {
        let shop = setup(500.0, 40.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 2))
            .await
            .unwrap();
        assert_eq!(order.total_amount(), 9.0);

        let settled = shop.services.orders.close(order.id_typed()).await.unwrap();

        assert_eq!(settled.order.status(), OrderStatus::Closed);
        assert_eq!(stock(&shop, shop.milk).await, 100.0);
        assert_eq!(stock(&shop, shop.coffee).await, 4.0);

        let usage: Vec<_> = settled
            .inventory_updates
            .iter()
            .map(|u| (u.ingredient_id, u.quantity_used, u.remaining))
            .collect();
        assert_eq!(usage, vec![(shop.milk, 400.0, 100.0), (shop.coffee, 36.0, 4.0)]);
        assert_eq!(status(&shop, order.id_typed()).await, OrderStatus::Closed);
    }

    #[tokio::test]
    async fn insufficient_stock_refuses_whole_settlement() {
        let shop = setup(300.0, 40.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 2))
            .await
            .unwrap();

        match shop.services.orders.close(order.id_typed()).await {
            Err(ServiceError::InsufficientInventory(shortfall)) => {
                assert_eq!(shortfall.ingredient_id, shop.milk);
                assert_eq!(shortfall.required, 400.0);
                assert_eq!(shortfall.available, 300.0);
            }
            other => panic!("Expected insufficient inventory, got {other:?}"),
        }

        assert_eq!(stock(&shop, shop.milk).await, 300.0);
        assert_eq!(stock(&shop, shop.coffee).await, 40.0);
        assert_eq!(status(&shop, order.id_typed()).await, OrderStatus::Open);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let shop = setup(500.0, 40.0, None).await;

        let err = shop.services.orders.close(OrderId::new(999)).await.unwrap_err();

        assert_eq!(err, ServiceError::NotFound { entity: "order", id: 999 });
        assert_eq!(stock(&shop, shop.milk).await, 500.0);
    }

    #[tokio::test]
    async fn second_close_is_rejected_without_deducting() {
        let shop = setup(500.0, 40.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 1))
            .await
            .unwrap();

        shop.services.orders.close(order.id_typed()).await.unwrap();
        let after_first = (stock(&shop, shop.milk).await, stock(&shop, shop.coffee).await);

        let err = shop.services.orders.close(order.id_typed()).await.unwrap_err();

        assert_eq!(err, ServiceError::AlreadyClosed(order.id_typed()));
        assert_eq!(
            (stock(&shop, shop.milk).await, stock(&shop, shop.coffee).await),
            after_first
        );
    }

    #[tokio::test]
    async fn order_without_items_closes_trivially() {
        let shop = setup(500.0, 40.0, None).await;
        let order = shop
            .store
            .insert_order(PricedOrder {
                customer_name: "Walk In".to_string(),
                special_instructions: SpecialInstructions::default(),
                items: Vec::new(),
                total_amount: 0.0,
            })
            .await
            .unwrap();

        let settled = shop.services.orders.close(order.id_typed()).await.unwrap();

        assert!(settled.inventory_updates.is_empty());
        assert_eq!(settled.order.status(), OrderStatus::Closed);
    }

    #[tokio::test]
    async fn low_stock_fires_at_threshold_not_above() {
        let shop = setup(10_000.0, 10_000.0, None).await;
        let sugar = shop
            .services
            .inventory
            .create(test_ingredient("Sugar", 10.0, Some(4.0)))
            .await
            .unwrap()
            .id_typed();
        let sweet = shop
            .services
            .menu
            .create(NewMenuItem {
                name: "Sugar Shot".to_string(),
                description: "One spoon of sugar per unit".to_string(),
                price: 0.5,
                categories: Vec::new(),
                ingredients: vec![RecipeLine {
                    ingredient_id: sugar,
                    quantity: 1.0,
                }],
                available: true,
            })
            .await
            .unwrap()
            .id_typed();

        // D = S - T - 1 leaves 5 > 4
        let above = shop.services.orders.create(test_order("Bob", sweet, 5)).await.unwrap();
        let settled = shop.services.orders.close(above.id_typed()).await.unwrap();
        assert!(!settled.inventory_updates[0].low_stock);

        // restock to 10 and take D = S - T, leaving exactly 4
        shop.services
            .inventory
            .update(sugar, test_ingredient("Sugar", 10.0, Some(4.0)))
            .await
            .unwrap();
        let at = shop.services.orders.create(test_order("Bob", sweet, 6)).await.unwrap();
        let settled = shop.services.orders.close(at.id_typed()).await.unwrap();
        assert_eq!(settled.inventory_updates[0].remaining, 4.0);
        assert!(settled.inventory_updates[0].low_stock);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_closes_conserve_stock() {
        let shop = setup(1_000.0, 1_000.0, None).await;
        let mut ids = Vec::new();
        for i in 0..10 {
            let order = shop
                .services
                .orders
                .create(test_order(&format!("Guest {i:03}"), shop.latte, 1))
                .await
                .unwrap();
            ids.push(order.id_typed());
        }

        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let orders = shop.services.orders.clone();
                tokio::spawn(async move { orders.close(id).await })
            })
            .collect();

        let mut accepted = 0;
        let mut milk_used = 0.0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(settled) => {
                    accepted += 1;
                    milk_used += settled.inventory_updates[0].quantity_used;
                }
                Err(err) => assert!(err.is_insufficient_inventory(), "unexpected {err:?}"),
            }
        }

        // 1000 ml of milk covers exactly five lattes
        assert_eq!(accepted, 5);
        assert_eq!(milk_used, 1_000.0);
        assert_eq!(stock(&shop, shop.milk).await, 0.0);
        assert_eq!(stock(&shop, shop.coffee).await, 1_000.0 - 5.0 * 18.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_close_of_same_order_deducts_once() {
        let shop = setup(5_000.0, 5_000.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 3))
            .await
            .unwrap();
        let id = order.id_typed();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orders = shop.services.orders.clone();
                tokio::spawn(async move { orders.close(id).await })
            })
            .collect();

        let mut closed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => closed += 1,
                Err(err) => assert_eq!(err, ServiceError::AlreadyClosed(id)),
            }
        }

        assert_eq!(closed, 1);
        assert_eq!(stock(&shop, shop.milk).await, 5_000.0 - 600.0);
    }

    #[tokio::test]
    async fn failed_writes_roll_back_everything() {
        for fault in [Fault::FailDecrement(1), Fault::FailDecrement(2), Fault::FailMarkClosed] {
            let shop = setup(500.0, 40.0, None).await;
            let order = shop
                .services
                .orders
                .create(test_order("Alice", shop.latte, 2))
                .await
                .unwrap();

            shop.store.inject_fault(fault).await;
            match shop.services.orders.close(order.id_typed()).await {
                Err(ServiceError::Transaction(_)) => {}
                other => panic!("Expected transaction failure for {fault:?}, got {other:?}"),
            }

            assert_eq!(stock(&shop, shop.milk).await, 500.0, "{fault:?}");
            assert_eq!(stock(&shop, shop.coffee).await, 40.0, "{fault:?}");
            assert_eq!(status(&shop, order.id_typed()).await, OrderStatus::Open, "{fault:?}");

            // safe to retry from scratch
            shop.services.orders.close(order.id_typed()).await.unwrap();
            assert_eq!(stock(&shop, shop.milk).await, 100.0);
        }
    }

    #[tokio::test]
    async fn expired_deadline_rolls_back() {
        let shop = setup(500.0, 40.0, Some(Duration::from_millis(50))).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 2))
            .await
            .unwrap();

        shop.store
            .inject_fault(Fault::Stall(Duration::from_millis(500)))
            .await;
        match shop.services.orders.close(order.id_typed()).await {
            Err(ServiceError::Transaction(msg)) => assert!(msg.contains("exceeded")),
            other => panic!("Expected deadline failure, got {other:?}"),
        }

        assert_eq!(stock(&shop, shop.milk).await, 500.0);
        assert_eq!(status(&shop, order.id_typed()).await, OrderStatus::Open);
        shop.services.orders.close(order.id_typed()).await.unwrap();
    }

    #[tokio::test]
    async fn panic_mid_settlement_rolls_back() {
        let shop = setup(500.0, 40.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 2))
            .await
            .unwrap();
        let id = order.id_typed();

        shop.store.inject_fault(Fault::PanicAfterDecrement).await;
        let orders = shop.services.orders.clone();
        let outcome = tokio::spawn(async move { orders.close(id).await }).await;
        assert!(outcome.unwrap_err().is_panic());

        assert_eq!(stock(&shop, shop.milk).await, 500.0);
        assert_eq!(status(&shop, id).await, OrderStatus::Open);
        shop.services.orders.close(id).await.unwrap();
    }

    #[tokio::test]
    async fn bulk_rejects_only_short_orders() {
        let shop = setup(500.0, 100.0, None).await;

        let response = shop
            .services
            .orders
            .process_bulk(vec![
                test_order("First Guest", shop.latte, 1),
                test_order("Second Guest", shop.latte, 5),
                test_order("Third Guest", shop.latte, 1),
            ])
            .await
            .unwrap();

        assert_eq!(response.summary.total_orders, 3);
        assert_eq!(response.summary.accepted, 2);
        assert_eq!(response.summary.rejected, 1);
        assert_eq!(response.summary.total_revenue, 9.0);
        assert_eq!(response.summary.inventory_updates.len(), 4);

        let second = &response.processed_orders[1];
        assert_eq!(second.customer_name, "Second Guest");
        assert_eq!(second.status, BulkOutcome::Rejected);
        assert_eq!(second.reason.as_deref(), Some(REASON_INSUFFICIENT_INVENTORY));
        assert_eq!(second.total, None);
        assert_eq!(status(&shop, second.order_id).await, OrderStatus::Open);

        assert_eq!(stock(&shop, shop.milk).await, 100.0);
        assert_eq!(stock(&shop, shop.coffee).await, 64.0);
    }

    #[tokio::test]
    async fn bulk_with_invalid_request_writes_nothing() {
        let shop = setup(500.0, 100.0, None).await;

        let err = shop
            .services
            .orders
            .process_bulk(vec![
                test_order("First Guest", shop.latte, 1),
                test_order("Ghost", MenuItemId::new(999), 1),
            ])
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::NotFound { entity: "menu item", id: 999 });
        assert!(shop.services.orders.list().await.unwrap().is_empty());
        assert_eq!(stock(&shop, shop.milk).await, 500.0);

        let empty = shop.services.orders.process_bulk(Vec::new()).await.unwrap();
        assert!(empty.processed_orders.is_empty());
        assert_eq!(empty.summary.total_orders, 0);
        assert_eq!(empty.summary.accepted, 0);
        assert_eq!(empty.summary.total_revenue, 0.0);
    }

    #[tokio::test]
    async fn bulk_aborts_on_non_inventory_failure() {
        let shop = setup(500.0, 100.0, None).await;
        shop.store.inject_fault(Fault::FailMarkClosed).await;

        let err = shop
            .services
            .orders
            .process_bulk(vec![
                test_order("First Guest", shop.latte, 1),
                test_order("Second Guest", shop.latte, 1),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Transaction(_)));
        assert!(!err.is_insufficient_inventory());
        assert_eq!(stock(&shop, shop.milk).await, 500.0);
    }

    #[tokio::test]
    async fn update_replaces_items_until_closed() {
        let shop = setup(500.0, 40.0, None).await;
        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 1))
            .await
            .unwrap();
        let id = order.id_typed();

        let updated = shop
            .services
            .orders
            .update(id, test_order("Alice", shop.latte, 2))
            .await
            .unwrap();
        assert_eq!(updated.status(), OrderStatus::Updated);
        assert_eq!(updated.total_amount(), 9.0);
        assert_eq!(updated.items()[0].quantity, 2);

        shop.services.orders.close(id).await.unwrap();
        let err = shop
            .services
            .orders
            .update(id, test_order("Alice", shop.latte, 1))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::AlreadyClosed(id));
    }

    #[tokio::test]
    async fn invalid_update_is_rejected_before_lookup() {
        let shop = setup(500.0, 40.0, None).await;

        let err = shop
            .services
            .orders
            .update(OrderId::new(999), test_order("A", shop.latte, -3))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");

        let order = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 1))
            .await
            .unwrap();
        let id = order.id_typed();
        shop.services.orders.close(id).await.unwrap();
        let err = shop
            .services
            .orders
            .update(id, test_order("Alice", shop.latte, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn recipes_must_reference_existing_inventory() {
        let shop = setup(500.0, 40.0, None).await;

        let err = shop
            .services
            .menu
            .create(NewMenuItem {
                name: "Mystery Brew".to_string(),
                description: "Made from an unknown ingredient".to_string(),
                price: 3.0,
                categories: Vec::new(),
                ingredients: vec![RecipeLine {
                    ingredient_id: IngredientId::new(42),
                    quantity: 1.0,
                }],
                available: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotFound { entity: "inventory item", id: 42 });

        match shop.services.inventory.delete(shop.milk).await {
            Err(ServiceError::Conflict(msg)) => assert!(msg.contains("used by")),
            other => panic!("Expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_reflect_settled_orders() {
        let shop = setup(5_000.0, 5_000.0, None).await;
        let first = shop
            .services
            .orders
            .create(test_order("Alice", shop.latte, 2))
            .await
            .unwrap();
        shop.services
            .orders
            .create(test_order("Bob", shop.latte, 1))
            .await
            .unwrap();
        shop.services.orders.close(first.id_typed()).await.unwrap();

        assert_eq!(shop.services.reports.total_sales().await.unwrap(), 9.0);

        let popular = shop.services.reports.popular_items(10).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].quantity_sold, 3);

        let counts = shop
            .services
            .orders
            .number_of_ordered_items(None, None)
            .await
            .unwrap();
        assert_eq!(counts.get("Latte"), Some(&3));

        let leftovers = shop.store.list_inventory().await.unwrap();
        assert_eq!(leftovers.len(), 2);
    }
}
