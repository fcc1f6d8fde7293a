mod support;

use std::{collections::HashSet, sync::Arc};

use api::{
    ApiError, OrderNumberGenerator, OrderService,
    models::{OrderStatus, UpdateOrderRequest, UpdateProduct},
    repositories::OrderItemRepository,
};
use common::{config::OrderNumberStrategy, pagination::Pagination};
use rust_decimal_macros::dec;
use support::{engine, engine_with, line, order_request};
use uuid::Uuid;

fn frozen() -> i64 {
    1_700_000_000
}

#[tokio::test]
async fn create_order_prices_lines_and_reserves_stock() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let a = e.product("SKU-A", dec!(19.99), 10).await;
    let b = e.product("SKU-B", dec!(5.00), 3).await;

    let details = e
        .orders
        .create_order(order_request(customer.id, vec![line(a.id, 2), line(b.id, 1)]))
        .await
        .unwrap();

    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.total_amount, dec!(44.98));
    assert!(details.order.order_number.starts_with("ORD-"));
    assert_eq!(details.customer.id, customer.id);
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.items[0].product_id, a.id);
    assert_eq!(details.items[0].unit_price, dec!(19.99));
    assert_eq!(details.items[0].total_price, dec!(39.98));
    assert_eq!(details.items[1].total_price, dec!(5.00));

    assert_eq!(e.stock(a.id).await, 8);
    assert_eq!(e.stock(b.id).await, 2);

    let by_number = e
        .orders
        .get_order_by_number(&details.order.order_number)
        .await
        .unwrap();
    assert_eq!(by_number.order.id, details.order.id);
    assert_eq!(by_number.items.len(), 2);

    let item = e.store.find_item(details.items[1].id).await.unwrap().unwrap();
    assert_eq!(item.order_id, details.order.id);
    assert_eq!(item.quantity, 1);
}

#[tokio::test]
async fn insufficient_stock_leaves_nothing_behind() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let plenty = e.product("SKU-A", dec!(1.00), 100).await;
    let scarce = e.product("SKU-B", dec!(2.00), 2).await;

    let err = e
        .orders
        .create_order(order_request(
            customer.id,
            vec![line(plenty.id, 5), line(scarce.id, 3)],
        ))
        .await
        .unwrap_err();

    match err {
        ApiError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, scarce.id);
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }

    assert_eq!(e.stock(plenty.id).await, 100);
    assert_eq!(e.stock(scarce.id).await, 2);
    assert_eq!(e.store.order_count().await, 0);
    assert_eq!(e.store.item_count().await, 0);
}

#[tokio::test]
async fn inactive_products_cannot_be_ordered() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(3.50), 10).await;
    e.catalog
        .update_product(
            product.id,
            UpdateProduct {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::InvalidState(_)));
    assert_eq!(e.stock(product.id).await, 10);
    assert_eq!(e.store.order_count().await, 0);
}

#[tokio::test]
async fn cancelling_restores_stock_exactly_once() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(10.00), 10).await;

    let details = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 3)]))
        .await
        .unwrap();
    assert_eq!(e.stock(product.id).await, 7);

    let cancelled = e.orders.cancel_order(details.order.id).await.unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(e.stock(product.id).await, 10);

    let err = e.orders.cancel_order(details.order.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    assert_eq!(e.stock(product.id).await, 10);
}

#[tokio::test]
async fn shipped_orders_cannot_be_cancelled() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(10.00), 10).await;
    let details = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap();

    e.orders
        .update_order_status(details.order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    let err = e.orders.cancel_order(details.order.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    assert_eq!(e.stock(product.id).await, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() {
    let e = Arc::new(engine());
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(10.00), 5).await;

    let (customer_id, product_id) = (customer.id, product.id);

    let spawn = move |e: Arc<support::Engine>| {
        tokio::spawn(async move {
            e.orders
                .create_order(order_request(customer_id, vec![line(product_id, 3)]))
                .await
        })
    };
    let first = spawn(e.clone());
    let second = spawn(e.clone());
    let results = [first.await.unwrap(), second.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(ApiError::InsufficientStock { available: 2, .. })))
    );
    assert_eq!(e.stock(product.id).await, 2);
    assert_eq!(e.store.order_count().await, 1);
}

#[tokio::test]
async fn repeated_lines_draw_on_the_same_stock() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(2.00), 5).await;

    let err = e
        .orders
        .create_order(order_request(
            customer.id,
            vec![line(product.id, 2), line(product.id, 2), line(product.id, 2)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));
    assert_eq!(e.stock(product.id).await, 5);

    let details = e
        .orders
        .create_order(order_request(
            customer.id,
            vec![line(product.id, 2), line(product.id, 3)],
        ))
        .await
        .unwrap();
    assert_eq!(details.items.len(), 2);
    assert_eq!(details.order.total_amount, dec!(10.00));
    assert_eq!(e.stock(product.id).await, 0);
}

#[tokio::test]
async fn malformed_requests_are_rejected_before_touching_stock() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(2.00), 5).await;

    let empty = order_request(customer.id, vec![]);
    assert!(matches!(
        e.orders.create_order(empty).await,
        Err(ApiError::BadRequest(_))
    ));

    let zero = order_request(customer.id, vec![line(product.id, 0)]);
    assert!(matches!(
        e.orders.create_order(zero).await,
        Err(ApiError::BadRequest(_))
    ));

    let mut blank = order_request(customer.id, vec![line(product.id, 1)]);
    blank.shipping_address = "   ".to_string();
    assert!(matches!(
        e.orders.create_order(blank).await,
        Err(ApiError::BadRequest(_))
    ));

    let stranger = order_request(Uuid::new_v4(), vec![line(product.id, 1)]);
    assert!(matches!(
        e.orders.create_order(stranger).await,
        Err(ApiError::NotFound("customer"))
    ));

    let unknown = order_request(customer.id, vec![line(product.id, 1), line(Uuid::new_v4(), 1)]);
    assert!(matches!(
        e.orders.create_order(unknown).await,
        Err(ApiError::NotFound("product"))
    ));

    assert_eq!(e.stock(product.id).await, 5);
    assert_eq!(e.store.order_count().await, 0);
}

#[tokio::test]
async fn same_second_orders_get_suffixed_numbers() {
    let e = engine_with(OrderNumberGenerator::with_clock(
        OrderNumberStrategy::Suffix,
        frozen,
    ));
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 100).await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let details = e
            .orders
            .create_order(order_request(customer.id, vec![line(product.id, 1)]))
            .await
            .unwrap();
        numbers.push(details.order.order_number);
    }

    assert_eq!(
        numbers,
        vec!["ORD-1700000000", "ORD-1700000000-1", "ORD-1700000000-2"]
    );
}

#[tokio::test]
async fn monotonic_numbers_never_repeat() {
    let e = engine_with(OrderNumberGenerator::with_clock(
        OrderNumberStrategy::Monotonic,
        frozen,
    ));
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 100).await;

    let first = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap();
    let second = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap();

    assert_eq!(first.order.order_number, "ORD-1700000000");
    assert_eq!(second.order.order_number, "ORD-1700000001");
}

#[tokio::test]
async fn busy_seconds_never_run_out_of_numbers() {
    let e = engine_with(OrderNumberGenerator::with_clock(
        OrderNumberStrategy::Suffix,
        frozen,
    ));
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 100).await;

    let mut numbers = HashSet::new();
    for _ in 0..25 {
        let details = e
            .orders
            .create_order(order_request(customer.id, vec![line(product.id, 1)]))
            .await
            .unwrap();
        assert!(numbers.insert(details.order.order_number));
    }

    assert_eq!(numbers.len(), 25);
    assert!(numbers.contains("ORD-1700000000-24"));
    assert_eq!(e.stock(product.id).await, 75);
    assert_eq!(e.store.order_count().await, 25);
}

#[tokio::test]
async fn numbers_taken_elsewhere_fail_without_reserving_stock() {
    let e = engine_with(OrderNumberGenerator::with_clock(
        OrderNumberStrategy::Suffix,
        frozen,
    ));
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 100).await;

    for _ in 0..10 {
        e.orders
            .create_order(order_request(customer.id, vec![line(product.id, 1)]))
            .await
            .unwrap();
    }

    // A second instance over the same store starts its own count at zero
    let other = OrderService::with_numbers(
        e.store.clone(),
        e.customers.clone(),
        OrderNumberGenerator::with_clock(OrderNumberStrategy::Suffix, frozen),
    );
    let err = other
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyExists(_)));
    assert_eq!(e.stock(product.id).await, 90);
    assert_eq!(e.store.order_count().await, 10);

    // Its next attempt moves past the numbers it has already tried
    let details = other
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap();
    assert_eq!(details.order.order_number, "ORD-1700000000-10");
}

#[tokio::test]
async fn order_lines_keep_the_price_they_were_sold_at() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(19.99), 10).await;

    let placed = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 3)]))
        .await
        .unwrap();

    e.catalog
        .update_product(
            product.id,
            UpdateProduct {
                price: Some(dec!(24.50)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reread = e.orders.get_order(placed.order.id).await.unwrap();
    assert_eq!(reread.items[0].unit_price, dec!(19.99));
    assert_eq!(reread.items[0].total_price, dec!(59.97));
    assert_eq!(reread.order.total_amount, dec!(59.97));
    assert_eq!(
        e.catalog.get_product(product.id).await.unwrap().price,
        dec!(24.50)
    );
}

#[tokio::test]
async fn status_moves_forward_and_stamps_dates() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 10).await;
    let id = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap()
        .order
        .id;

    for status in [OrderStatus::Confirmed, OrderStatus::Processing] {
        let details = e.orders.update_order_status(id, status).await.unwrap();
        assert_eq!(details.order.status, status);
        assert!(details.order.shipped_date.is_none());
    }

    let shipped = e
        .orders
        .update_order_status(id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert!(shipped.order.shipped_date.is_some());
    assert!(shipped.order.delivered_date.is_none());

    let delivered = e
        .orders
        .update_order_status(id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.order.shipped_date, shipped.order.shipped_date);
    assert!(delivered.order.delivered_date.is_some());

    for status in [OrderStatus::Shipped, OrderStatus::Pending, OrderStatus::Cancelled] {
        assert!(matches!(
            e.orders.update_order_status(id, status).await,
            Err(ApiError::InvalidState(_))
        ));
    }
}

#[tokio::test]
async fn cancel_through_update_is_refused() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 10).await;
    let id = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 4)]))
        .await
        .unwrap()
        .order
        .id;

    let err = e
        .orders
        .update_order(
            id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    assert_eq!(e.stock(product.id).await, 6);
    assert_eq!(
        e.orders.get_order(id).await.unwrap().order.status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn update_patches_addresses_but_not_totals() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(7.25), 10).await;
    let created = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 2)]))
        .await
        .unwrap();

    let updated = e
        .orders
        .update_order(
            created.order.id,
            UpdateOrderRequest {
                shipping_address: Some("9 Dock Rd".to_string()),
                notes: Some("leave at the door".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.order.shipping_address, "9 Dock Rd");
    assert_eq!(updated.order.billing_address, created.order.billing_address);
    assert_eq!(updated.order.notes, "leave at the door");
    assert_eq!(updated.order.total_amount, dec!(14.50));

    let err = e
        .orders
        .update_order(
            created.order.id,
            UpdateOrderRequest {
                billing_address: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn only_cancelled_orders_can_be_deleted() {
    let e = engine();
    let customer = e.customer("grace@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 10).await;
    let id = e
        .orders
        .create_order(order_request(customer.id, vec![line(product.id, 1)]))
        .await
        .unwrap()
        .order
        .id;

    assert!(matches!(
        e.orders.delete_order(id).await,
        Err(ApiError::InvalidState(_))
    ));

    e.orders.cancel_order(id).await.unwrap();
    e.orders.delete_order(id).await.unwrap();

    assert!(matches!(
        e.orders.get_order(id).await,
        Err(ApiError::NotFound("order"))
    ));
    assert_eq!(e.store.item_count().await, 0);
    assert!(matches!(
        e.orders.delete_order(id).await,
        Err(ApiError::NotFound("order"))
    ));
}

#[tokio::test]
async fn orders_are_listed_by_customer_and_status() {
    let e = engine();
    let grace = e.customer("grace@example.com").await;
    let ada = e.customer("ada@example.com").await;
    let product = e.product("SKU-A", dec!(1.00), 10).await;

    let first = e
        .orders
        .create_order(order_request(grace.id, vec![line(product.id, 1)]))
        .await
        .unwrap();
    e.orders
        .create_order(order_request(grace.id, vec![line(product.id, 1)]))
        .await
        .unwrap();
    e.orders
        .create_order(order_request(ada.id, vec![line(product.id, 1)]))
        .await
        .unwrap();
    e.orders.cancel_order(first.order.id).await.unwrap();

    let page = Pagination::default();
    assert_eq!(e.orders.list_orders(page).await.unwrap().len(), 3);
    assert_eq!(
        e.orders
            .list_orders_by_customer(grace.id, page)
            .await
            .unwrap()
            .len(),
        2
    );

    let cancelled = e
        .orders
        .list_orders_by_status(OrderStatus::Cancelled, page)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, first.order.id);

    assert_eq!(
        e.orders
            .list_orders(Pagination::new(1, 0))
            .await
            .unwrap()
            .len(),
        1
    );
}
