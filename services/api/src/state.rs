//! Application state shared across handlers

use std::sync::Arc;

use auth::{
    AccountService, AuthService, JwtService, OidcClient,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{CustomerRepository, PgCustomerRepository, PgUserRepository, UserRepository},
    routes::AuthState,
};
use common::config::OrderNumberStrategy;
use sqlx::PgPool;

use crate::{
    catalog::CatalogService,
    notifications::{LogNotifier, Notifier},
    orders::OrderService,
    repositories::{
        CategoryRepository, OrderStore, PgCategoryRepository, PgOrderRepository,
        PgProductRepository, ProductRepository,
    },
};

/// The set of store implementations one deployment runs on
pub trait Backend: Send + Sync + 'static {
    type Users: UserRepository;
    type Customers: CustomerRepository;
    type Categories: CategoryRepository;
    type Products: ProductRepository;
    type Orders: OrderStore;
    type Notifier: Notifier;
}

/// Postgres-backed stores
pub struct PgBackend;

impl Backend for PgBackend {
    type Users = PgUserRepository;
    type Customers = PgCustomerRepository;
    type Categories = PgCategoryRepository;
    type Products = PgProductRepository;
    type Orders = PgOrderRepository;
    type Notifier = LogNotifier;
}

/// In-memory stores for tests
#[cfg(any(test, feature = "test-utils"))]
pub struct MemoryBackend;

#[cfg(any(test, feature = "test-utils"))]
impl Backend for MemoryBackend {
    type Users = auth::repositories::MemoryUserRepository;
    type Customers = auth::repositories::MemoryCustomerRepository;
    type Categories = crate::repositories::MemoryStore;
    type Products = crate::repositories::MemoryStore;
    type Orders = crate::repositories::MemoryStore;
    type Notifier = LogNotifier;
}

/// Store handles the state is assembled from
pub struct Components<B: Backend> {
    pub users: B::Users,
    pub customers: B::Customers,
    pub categories: B::Categories,
    pub products: B::Products,
    pub orders: B::Orders,
    pub notifier: B::Notifier,
}

impl Components<PgBackend> {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            customers: PgCustomerRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            products: PgProductRepository::new(pool.clone()),
            orders: PgOrderRepository::new(pool.clone()),
            notifier: LogNotifier,
        }
    }
}

/// Services and settings the handlers need
pub struct ServiceSettings {
    pub jwt: JwtService,
    pub oidc: Option<Arc<OidcClient>>,
    pub rate_limits: RateLimiterConfig,
    pub number_strategy: OrderNumberStrategy,
}

/// Application state shared across handlers
pub struct AppState<B: Backend> {
    /// Present when running against Postgres; used by the health check
    pub db_pool: Option<PgPool>,
    pub auth: AuthState<B::Users, B::Customers>,
    pub orders: Arc<OrderService<B::Orders, B::Customers>>,
    pub catalog: Arc<CatalogService<B::Categories, B::Products>>,
    pub notifier: B::Notifier,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            db_pool: self.db_pool.clone(),
            auth: self.auth.clone(),
            orders: self.orders.clone(),
            catalog: self.catalog.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<B: Backend> AppState<B> {
    pub fn new(components: Components<B>, settings: ServiceSettings) -> Self {
        let Components {
            users,
            customers,
            categories,
            products,
            orders,
            notifier,
        } = components;

        let auth = AuthService::new(
            users.clone(),
            customers.clone(),
            settings.jwt,
            settings.oidc,
            RateLimiter::new(settings.rate_limits),
        );
        let accounts = AccountService::new(users, customers.clone());

        Self {
            db_pool: None,
            auth: AuthState::new(auth, accounts),
            orders: Arc::new(OrderService::new(
                orders,
                customers,
                settings.number_strategy,
            )),
            catalog: Arc::new(CatalogService::new(categories, products)),
            notifier,
        }
    }

    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}
