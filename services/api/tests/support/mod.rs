//! Shared fixtures: the order engine and catalog over in-memory stores
#![allow(dead_code)]

use api::{
    CatalogService, OrderNumberGenerator, OrderService,
    models::{Category, CreateOrderRequest, NewCategory, NewOrderLine, NewProduct, Product},
    repositories::MemoryStore,
};
use auth::{
    models::{Customer, NewCustomer},
    repositories::{CustomerRepository, MemoryCustomerRepository},
};
use common::config::OrderNumberStrategy;
use rust_decimal::Decimal;
use uuid::Uuid;

pub type MemoryOrderService = OrderService<MemoryStore, MemoryCustomerRepository>;
pub type MemoryCatalogService = CatalogService<MemoryStore, MemoryStore>;

pub struct Engine {
    pub orders: MemoryOrderService,
    pub catalog: MemoryCatalogService,
    pub store: MemoryStore,
    pub customers: MemoryCustomerRepository,
}

pub fn engine() -> Engine {
    engine_with(OrderNumberGenerator::new(OrderNumberStrategy::Suffix))
}

pub fn engine_with(numbers: OrderNumberGenerator) -> Engine {
    let store = MemoryStore::new();
    let customers = MemoryCustomerRepository::new();
    Engine {
        orders: OrderService::with_numbers(store.clone(), customers.clone(), numbers),
        catalog: CatalogService::new(store.clone(), store.clone()),
        store,
        customers,
    }
}

impl Engine {
    pub async fn customer(&self, email: &str) -> Customer {
        self.customers
            .create(&Customer::new(NewCustomer {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: email.to_string(),
                ..Default::default()
            }))
            .await
            .unwrap()
    }

    pub async fn category(&self, name: &str) -> Category {
        self.catalog
            .create_category(NewCategory {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    pub async fn product(&self, sku: &str, price: Decimal, stock: i32) -> Product {
        let category = match self.catalog.list_categories(Default::default()).await {
            Ok(categories) if !categories.is_empty() => categories[0].clone(),
            _ => self.category("General").await,
        };
        self.catalog
            .create_product(NewProduct {
                name: format!("Product {sku}"),
                description: None,
                price,
                stock_quantity: stock,
                sku: sku.to_string(),
                category_id: category.id,
                is_active: true,
            })
            .await
            .unwrap()
    }

    pub async fn stock(&self, product_id: Uuid) -> i32 {
        self.store.stock_of(product_id).await.unwrap()
    }
}

pub fn line(product_id: Uuid, quantity: i32) -> NewOrderLine {
    NewOrderLine {
        product_id,
        quantity,
    }
}

pub fn order_request(customer_id: Uuid, items: Vec<NewOrderLine>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id,
        shipping_address: "1 Harbour St, Springfield".to_string(),
        billing_address: "1 Harbour St, Springfield".to_string(),
        notes: String::new(),
        items,
    }
}

/// The full API router over in-memory stores, served on a random port
pub struct ApiApp {
    pub base_url: String,
    pub store: MemoryStore,
    pub customers: MemoryCustomerRepository,
    pub jwt: auth::JwtService,
}

pub const TEST_PASSWORD: &str = "Str0ng!Pass";

pub async fn spawn_api_app() -> ApiApp {
    use api::state::{AppState, Components, MemoryBackend, ServiceSettings};
    use auth::{JwtConfig, JwtService, rate_limiter::RateLimiterConfig};

    let jwt = JwtService::new(JwtConfig {
        access_secret: "api-access-secret".to_string(),
        refresh_secret: "api-refresh-secret".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 3600,
    })
    .unwrap();

    let store = MemoryStore::new();
    let customers = MemoryCustomerRepository::new();
    let state: AppState<MemoryBackend> = AppState::new(
        Components {
            users: auth::repositories::MemoryUserRepository::new(),
            customers: customers.clone(),
            categories: store.clone(),
            products: store.clone(),
            orders: store.clone(),
            notifier: api::notifications::LogNotifier,
        },
        ServiceSettings {
            jwt: jwt.clone(),
            oidc: None,
            rate_limits: RateLimiterConfig::default(),
            number_strategy: OrderNumberStrategy::Suffix,
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::routes::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    ApiApp {
        base_url: format!("http://{addr}"),
        store,
        customers,
        jwt,
    }
}

impl ApiApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a staff user and return its access token
    pub async fn staff_token(&self, client: &reqwest::Client) -> String {
        let body: serde_json::Value = client
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "name": "Staff Member",
                "email": format!("staff-{}@example.com", Uuid::new_v4().simple()),
                "password": TEST_PASSWORD,
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["tokens"]["access_token"].as_str().unwrap().to_string()
    }

    /// Create a customer and a local access token for it
    pub async fn customer_token(&self, email: &str) -> (Customer, String) {
        let customer = self
            .customers
            .create(&Customer::new(NewCustomer {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: email.to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();
        let token = self
            .jwt
            .generate_access_token(customer.id, &customer.email, auth::PrincipalKind::Customer)
            .unwrap();
        (customer, token)
    }
}
