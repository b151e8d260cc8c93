//! Product catalog.

use common::{Product, ProductId};
use store::{PRODUCTS_NAME_KEY, Store, StoreError};

use crate::DomainError;

/// Adds and looks up catalog products.
///
/// Stock set here is the initial stock; afterwards it only moves through
/// the stock ledger.
pub struct ProductCatalog<S: Store> {
    store: S,
}

impl<S: Store> ProductCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product. Names are unique.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(
        &self,
        name: &str,
        price: i64,
        stock: u32,
    ) -> Result<Product, DomainError> {
        if price < 0 {
            return Err(DomainError::InvalidPrice { price });
        }

        let product = Product::new(name, price, stock);
        match self.store.insert_product(&product).await {
            Ok(()) => Ok(product),
            Err(StoreError::UniqueViolation {
                constraint: PRODUCTS_NAME_KEY,
            }) => Err(DomainError::DuplicateProductName(product.name)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(DomainError::ProductNotFound(product_id))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }
}
