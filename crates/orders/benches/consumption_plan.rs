use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use brewline_core::{IngredientId, MenuItemId};
use brewline_inventory::InventoryItem;
use brewline_menu::RecipeLine;
use brewline_orders::{ConsumptionPlan, OrderItem};

/// A catalog of `products` items, each using 8 of 64 shared ingredients.
fn catalog(products: i64) -> HashMap<MenuItemId, Vec<RecipeLine>> {
    (1..=products)
        .map(|p| {
            let recipe = (0..8)
                .map(|k| RecipeLine {
                    ingredient_id: IngredientId::new((p * 7 + k) % 64 + 1),
                    quantity: 10.0 + k as f64,
                })
                .collect();
            (MenuItemId::new(p), recipe)
        })
        .collect()
}

fn order_items(lines: i64) -> Vec<OrderItem> {
    (1..=lines)
        .map(|p| OrderItem {
            product_id: MenuItemId::new(p),
            quantity: 2,
            price: 3.0,
        })
        .collect()
}

fn full_stock() -> BTreeMap<IngredientId, InventoryItem> {
    let now = Utc::now();
    (1..=64)
        .map(|i| {
            let id = IngredientId::new(i);
            (id, InventoryItem::rehydrate(id, format!("ingredient-{i}"), 1e9, "g", Some(10.0), now))
        })
        .collect()
}

fn bench_build_and_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("consumption_plan");
    let stock = full_stock();

    for lines in [1i64, 10, 50] {
        let recipes = catalog(lines);
        let items = order_items(lines);

        group.bench_with_input(BenchmarkId::new("build", lines), &lines, |b, _| {
            b.iter(|| ConsumptionPlan::build(black_box(&items), black_box(&recipes)))
        });

        let plan = ConsumptionPlan::build(&items, &recipes).expect("plan");
        group.bench_with_input(BenchmarkId::new("verify", lines), &lines, |b, _| {
            b.iter(|| plan.verify(black_box(&stock)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_and_verify);
criterion_main!(benches);
