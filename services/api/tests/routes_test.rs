mod support;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use support::{ApiApp, spawn_api_app};
use uuid::Uuid;

/// Create a category and a product in it, returning the product body
async fn seed_product(
    app: &ApiApp,
    client: &Client,
    token: &str,
    sku: &str,
    stock: i32,
) -> Value {
    let category: Value = client
        .post(app.url("/categories"))
        .bearer_auth(token)
        .json(&json!({"name": format!("Category {sku}")}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(app.url("/products"))
        .bearer_auth(token)
        .json(&json!({
            "name": format!("Product {sku}"),
            "price": "12.50",
            "stock_quantity": stock,
            "sku": sku,
            "category_id": category["id"],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

fn order_body(customer_id: &Value, product_id: &Value, quantity: i32) -> Value {
    json!({
        "customer_id": customer_id,
        "shipping_address": "1 Harbour St",
        "billing_address": "1 Harbour St",
        "items": [{"product_id": product_id, "quantity": quantity}],
    })
}

#[tokio::test]
async fn health_reports_ok_without_a_database() {
    let app = spawn_api_app().await;
    let response = reqwest::get(app.url("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "not configured");
}

#[tokio::test]
async fn catalog_reads_are_public_and_writes_need_staff() {
    let app = spawn_api_app().await;
    let client = Client::new();

    let response = client
        .post(app.url("/categories"))
        .json(&json!({"name": "Lighting"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let token = app.staff_token(&client).await;
    let product = seed_product(&app, &client, &token, "LAMP-1", 4).await;
    assert_eq!(product["stock_quantity"], 4);

    let categories: Vec<Value> = client
        .get(app.url("/categories"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(categories.len(), 1);

    let by_sku: Value = client
        .get(app.url("/products/sku/LAMP-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_sku["id"], product["id"]);

    let in_category: Vec<Value> = client
        .get(app.url(&format!(
            "/categories/{}/products",
            product["category_id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(in_category.len(), 1);

    let duplicate = client
        .post(app.url("/categories"))
        .bearer_auth(&token)
        .json(&json!({"name": "Category LAMP-1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn staff_run_the_order_lifecycle() {
    let app = spawn_api_app().await;
    let client = Client::new();
    let token = app.staff_token(&client).await;
    let (customer, _) = app.customer_token("ada@example.com").await;
    let product = seed_product(&app, &client, &token, "LAMP-1", 5).await;
    let customer_id = json!(customer.id);

    let response = client
        .post(app.url("/orders"))
        .bearer_auth(&token)
        .json(&order_body(&customer_id, &product["id"], 2))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["customer"]["email"], "ada@example.com");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    let id = order["id"].as_str().unwrap().to_string();

    let by_number = client
        .get(app.url(&format!(
            "/orders/number/{}",
            order["order_number"].as_str().unwrap()
        )))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(by_number.status(), StatusCode::OK);

    let shipped: Value = client
        .put(app.url(&format!("/orders/{id}/status")))
        .bearer_auth(&token)
        .json(&json!({"status": "shipped"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(shipped["status"], "shipped");
    assert!(shipped["shipped_date"].is_string());

    let bad_status = client
        .put(app.url(&format!("/orders/{id}/status")))
        .bearer_auth(&token)
        .json(&json!({"status": "lost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    let cancel = client
        .post(app.url(&format!("/orders/{id}/cancel")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = cancel.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_STATE");

    let shipped_list: Vec<Value> = client
        .get(app.url("/orders/status/shipped"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(shipped_list.len(), 1);

    let for_customer: Vec<Value> = client
        .get(app.url(&format!("/customers/{}/orders", customer.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(for_customer.len(), 1);

    let delete = client
        .delete(app.url(&format!("/orders/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn insufficient_stock_body_names_the_shortfall() {
    let app = spawn_api_app().await;
    let client = Client::new();
    let token = app.staff_token(&client).await;
    let (customer, _) = app.customer_token("ada@example.com").await;
    let product = seed_product(&app, &client, &token, "LAMP-1", 1).await;

    let response = client
        .post(app.url("/orders"))
        .bearer_auth(&token)
        .json(&order_body(&json!(customer.id), &product["id"], 3))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["product_id"], product["id"]);
    assert_eq!(body["requested"], 3);
    assert_eq!(body["available"], 1);
}

#[tokio::test]
async fn customers_manage_only_their_own_orders() {
    let app = spawn_api_app().await;
    let client = Client::new();
    let staff = app.staff_token(&client).await;
    let product = seed_product(&app, &client, &staff, "LAMP-1", 10).await;
    let (_, ada) = app.customer_token("ada@example.com").await;
    let (_, eve) = app.customer_token("eve@example.com").await;

    let response = client
        .post(app.url("/me/orders"))
        .bearer_auth(&ada)
        .json(&json!({
            "shipping_address": "1 Harbour St",
            "billing_address": "1 Harbour St",
            "items": [{"product_id": product["id"], "quantity": 4}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Value = response.json().await.unwrap();
    let id = order["id"].as_str().unwrap().to_string();
    let product_id: Uuid = product["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.store.stock_of(product_id).await, Some(6));

    let mine: Vec<Value> = client
        .get(app.url("/me/orders"))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    let theirs = client
        .get(app.url(&format!("/me/orders/{id}")))
        .bearer_auth(&eve)
        .send()
        .await
        .unwrap();
    assert_eq!(theirs.status(), StatusCode::NOT_FOUND);

    let not_theirs = client
        .post(app.url(&format!("/me/orders/{id}/cancel")))
        .bearer_auth(&eve)
        .send()
        .await
        .unwrap();
    assert_eq!(not_theirs.status(), StatusCode::NOT_FOUND);

    let cancelled: Value = client
        .post(app.url(&format!("/me/orders/{id}/cancel")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.store.stock_of(product_id).await, Some(10));

    // A staff token is not a customer credential
    let staff_on_me = client
        .get(app.url("/me/orders"))
        .bearer_auth(&staff)
        .send()
        .await
        .unwrap();
    assert_eq!(staff_on_me.status(), StatusCode::UNAUTHORIZED);

    // Nor is a customer token a staff one
    let customer_on_orders = client
        .get(app.url("/orders"))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(customer_on_orders.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn notifications_are_validated_per_type() {
    let app = spawn_api_app().await;
    let client = Client::new();
    let token = app.staff_token(&client).await;

    let sent = client
        .post(app.url("/notifications"))
        .bearer_auth(&token)
        .json(&json!({"type": "sms", "to": "+4915112345678", "message": "Shipped"}))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status(), StatusCode::ACCEPTED);
    let receipt: Value = sent.json().await.unwrap();
    assert_eq!(receipt["type"], "sms");

    let bad_email = client
        .post(app.url("/notifications"))
        .bearer_auth(&token)
        .json(&json!({"type": "email", "to": "nobody", "subject": "Hi", "body": "Hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let unknown = client
        .post(app.url("/notifications"))
        .bearer_auth(&token)
        .json(&json!({"type": "pigeon", "to": "roof"}))
        .send()
        .await
        .unwrap();
    assert!(unknown.status().is_client_error());

    let anonymous = client
        .post(app.url("/notifications"))
        .json(&json!({"type": "sms", "to": "+4915112345678", "message": "Hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
