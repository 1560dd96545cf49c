use std::collections::HashMap;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{Cart, Money, Product, ProductId};

fn catalog(size: usize) -> Vec<Product> {
    (0..size)
        .map(|i| {
            Product::new(
                format!("SKU-{i:04}"),
                format!("Product {i}"),
                Money::from_cents(100 + i as i64),
                50,
            )
        })
        .collect()
}

fn bench_add_lines(c: &mut Criterion) {
    let products = catalog(50);

    c.bench_function("cart/add_50_lines", |b| {
        b.iter(|| {
            let mut cart = Cart::new();
            for product in &products {
                cart.add(product, 2, false);
            }
            cart
        });
    });
}

fn bench_session_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("cart/session_load");

    for size in [1, 10, 100] {
        let mut cart = Cart::new();
        for product in &catalog(size) {
            cart.add(product, 1, false);
        }
        let blob = cart.to_session();

        group.bench_with_input(BenchmarkId::from_parameter(size), &blob, |b, blob| {
            b.iter(|| Cart::from_session(Some(blob)));
        });
    }

    group.finish();
}

fn bench_refresh_and_total(c: &mut Criterion) {
    let products = catalog(100);
    let mut cart = Cart::new();
    for product in &products {
        cart.add(product, 3, false);
    }
    let live: HashMap<ProductId, u32> = products.iter().map(|p| (p.id.clone(), 2)).collect();

    c.bench_function("cart/refresh_then_total", |b| {
        b.iter(|| {
            let mut cart = cart.clone();
            cart.refresh_stock(&live);
            cart.total_price()
        });
    });
}

criterion_group!(
    benches,
    bench_add_lines,
    bench_session_round_trip,
    bench_refresh_and_total
);
criterion_main!(benches);
