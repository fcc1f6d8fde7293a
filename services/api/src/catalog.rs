//! Catalog service: the category tree and the products filed under it

use std::collections::HashSet;

use chrono::Utc;
use common::{error::DatabaseError, pagination::Pagination};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{Category, NewCategory, NewProduct, Product, UpdateCategory, UpdateProduct},
    repositories::{CATEGORIES_NAME_KEY, CategoryRepository, PRODUCTS_SKU_KEY, ProductRepository},
};

pub struct CatalogService<K: CategoryRepository, P: ProductRepository> {
    categories: K,
    products: P,
}

impl<K: CategoryRepository, P: ProductRepository> CatalogService<K, P> {
    pub fn new(categories: K, products: P) -> Self {
        Self {
            categories,
            products,
        }
    }

    pub async fn create_category(&self, input: NewCategory) -> ApiResult<Category> {
        not_blank(&input.name, "name")?;

        if let Some(parent_id) = input.parent_id {
            self.categories
                .find_by_id(parent_id)
                .await?
                .ok_or(ApiError::NotFound("parent category"))?;
        }

        let category = Category::new(input);
        if self.categories.find_by_name(&category.name).await?.is_some() {
            return Err(name_taken(&category.name));
        }

        let category = self
            .categories
            .create(&category)
            .await
            .map_err(|e| conflict(e, CATEGORIES_NAME_KEY, || name_taken(&category.name)))?;

        info!("Created category {}", category.name);
        Ok(category)
    }

    pub async fn get_category(&self, id: Uuid) -> ApiResult<Category> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("category"))
    }

    pub async fn list_categories(&self, page: Pagination) -> ApiResult<Vec<Category>> {
        Ok(self.categories.list(page).await?)
    }

    pub async fn list_children(&self, id: Uuid) -> ApiResult<Vec<Category>> {
        self.get_category(id).await?;
        Ok(self.categories.list_children(id).await?)
    }

    pub async fn update_category(&self, id: Uuid, patch: UpdateCategory) -> ApiResult<Category> {
        let mut category = self.get_category(id).await?;

        if let Some(name) = patch.name {
            not_blank(&name, "name")?;
            category.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            category.description = description;
        }
        if let Some(parent_id) = patch.parent_id {
            if let Some(parent_id) = parent_id {
                self.ensure_acyclic(id, parent_id).await?;
            }
            category.parent_id = parent_id;
        }
        category.updated_at = Utc::now();

        let name = category.name.clone();
        self.categories
            .update(&category)
            .await
            .map_err(|e| conflict(e, CATEGORIES_NAME_KEY, || name_taken(&name)))?
            .ok_or(ApiError::NotFound("category"))
    }

    /// Reject `parent_id` if `id` is that category or one of its ancestors
    async fn ensure_acyclic(&self, id: Uuid, parent_id: Uuid) -> ApiResult<()> {
        let mut visited = HashSet::new();
        let mut cursor = Some(parent_id);

        while let Some(current) = cursor {
            if current == id {
                return Err(ApiError::InvalidState(
                    "category cannot be nested under itself".to_string(),
                ));
            }
            if !visited.insert(current) {
                // An existing loop that does not involve `id`
                break;
            }
            let ancestor = self
                .categories
                .find_by_id(current)
                .await?
                .ok_or(ApiError::NotFound("parent category"))?;
            cursor = ancestor.parent_id;
        }

        Ok(())
    }

    /// Remove a category with no subcategories and no products
    pub async fn delete_category(&self, id: Uuid) -> ApiResult<()> {
        self.get_category(id).await?;

        if !self.categories.list_children(id).await?.is_empty() {
            return Err(ApiError::InvalidState(
                "category still has subcategories".to_string(),
            ));
        }
        if !self
            .products
            .list_by_category(id, Pagination::new(1, 0))
            .await?
            .is_empty()
        {
            return Err(ApiError::InvalidState(
                "category still has products".to_string(),
            ));
        }

        match self.categories.delete(id).await {
            Ok(true) => {
                info!("Deleted category {}", id);
                Ok(())
            }
            Ok(false) => Err(ApiError::NotFound("category")),
            Err(DatabaseError::ForeignKeyViolation(_)) => Err(ApiError::InvalidState(
                "category is still referenced".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn create_product(&self, input: NewProduct) -> ApiResult<Product> {
        not_blank(&input.name, "name")?;
        not_blank(&input.sku, "sku")?;
        non_negative_price(input.price)?;
        if input.stock_quantity < 0 {
            return Err(ApiError::BadRequest(
                "stock_quantity must not be negative".to_string(),
            ));
        }
        self.get_category(input.category_id).await?;

        let product = Product::new(input);
        if self.products.find_by_sku(&product.sku).await?.is_some() {
            return Err(sku_taken(&product.sku));
        }

        let product = self
            .products
            .create(&product)
            .await
            .map_err(|e| conflict(e, PRODUCTS_SKU_KEY, || sku_taken(&product.sku)))?;

        info!("Created product {} ({})", product.sku, product.id);
        Ok(product)
    }

    pub async fn get_product(&self, id: Uuid) -> ApiResult<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("product"))
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> ApiResult<Product> {
        self.products
            .find_by_sku(sku)
            .await?
            .ok_or(ApiError::NotFound("product"))
    }

    pub async fn list_products(&self, page: Pagination) -> ApiResult<Vec<Product>> {
        Ok(self.products.list(page).await?)
    }

    pub async fn list_products_by_category(
        &self,
        category_id: Uuid,
        page: Pagination,
    ) -> ApiResult<Vec<Product>> {
        self.get_category(category_id).await?;
        Ok(self.products.list_by_category(category_id, page).await?)
    }

    /// Update descriptive fields; stock is left to the order engine
    pub async fn update_product(&self, id: Uuid, patch: UpdateProduct) -> ApiResult<Product> {
        if let Some(name) = &patch.name {
            not_blank(name, "name")?;
        }
        if let Some(sku) = &patch.sku {
            not_blank(sku, "sku")?;
        }
        if let Some(price) = patch.price {
            non_negative_price(price)?;
        }

        let mut product = self.get_product(id).await?;
        if let Some(category_id) = patch.category_id {
            if category_id != product.category_id {
                self.get_category(category_id).await?;
            }
        }
        product.apply(patch);

        let sku = product.sku.clone();
        self.products
            .update(&product)
            .await
            .map_err(|e| conflict(e, PRODUCTS_SKU_KEY, || sku_taken(&sku)))?
            .ok_or(ApiError::NotFound("product"))
    }

    pub async fn delete_product(&self, id: Uuid) -> ApiResult<()> {
        match self.products.delete(id).await {
            Ok(true) => {
                info!("Deleted product {}", id);
                Ok(())
            }
            Ok(false) => Err(ApiError::NotFound("product")),
            Err(DatabaseError::ForeignKeyViolation(_)) => Err(ApiError::InvalidState(
                "product is referenced by existing orders".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

fn not_blank(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

fn non_negative_price(price: Decimal) -> ApiResult<()> {
    if price < Decimal::ZERO {
        return Err(ApiError::BadRequest("price must not be negative".to_string()));
    }
    Ok(())
}

fn name_taken(name: &str) -> ApiError {
    ApiError::AlreadyExists(format!("category '{name}' already exists"))
}

fn sku_taken(sku: &str) -> ApiError {
    ApiError::AlreadyExists(format!("sku '{sku}' already exists"))
}

fn conflict(err: DatabaseError, constraint: &str, taken: impl FnOnce() -> ApiError) -> ApiError {
    if err.is_unique_violation_on(constraint) {
        taken()
    } else if let DatabaseError::ForeignKeyViolation(_) = err {
        ApiError::InvalidState(err.to_string())
    } else {
        err.into()
    }
}
