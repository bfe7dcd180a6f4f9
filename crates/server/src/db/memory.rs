//! In-memory implementation of the [`Store`] trait.
//!
//! Useful for tests and development scenarios where persistence is not
//! required. Semantics match the `PostgreSQL` store: stock writes are atomic
//! under the write lock, order creation is all-or-nothing, and deleting an
//! absent order is a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use gilded_core::{OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, Store};
use crate::cart::CartLine;
use crate::models::{
    NewOrder, NewOrderLine, NewProduct, Order, OrderLine, OrderWithLines, Product, ProductUpdate,
    Profile,
};

/// Thread-safe in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    products: RwLock<HashMap<i32, Product>>,
    orders: RwLock<HashMap<i32, Order>>,
    // Lines keyed by order id; product names resolve weakly at read time.
    lines: RwLock<HashMap<i32, Vec<OrderLine>>>,
    profiles: RwLock<HashMap<i32, Profile>>,
    carts: RwLock<HashMap<i32, Vec<CartLine>>>,
    next_product_id: AtomicI32,
    next_order_id: AtomicI32,
    next_line_id: AtomicI32,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI32) -> i32 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Resolve line product names against the current catalog.
    fn resolve_names(&self, lines: &mut [OrderLine]) {
        let products = self.inner.products.read().expect("RwLock poisoned");
        for line in lines {
            line.product_name = products
                .get(&line.product_id.as_i32())
                .map(|p| p.name.clone());
        }
    }

    fn assemble(&self, order: Order) -> OrderWithLines {
        let mut lines = self
            .inner
            .lines
            .read()
            .expect("RwLock poisoned")
            .get(&order.id.as_i32())
            .cloned()
            .unwrap_or_default();
        self.resolve_names(&mut lines);
        OrderWithLines { order, lines }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.inner.products.read().expect("RwLock poisoned");
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_i32().cmp(&a.id.as_i32()))
        });
        Ok(all)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.inner.products.read().expect("RwLock poisoned");
        Ok(products.get(&id.as_i32()).cloned())
    }

    async fn insert_product(&self, input: NewProduct) -> Result<Product, RepositoryError> {
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(Self::next_id(&self.inner.next_product_id)),
            name: input.name,
            description: input.description,
            price: input.price,
            stock: input.stock.max(0),
            category: input.category,
            image_url: input.image_url,
            created_at: now,
            updated_at: now,
        };

        let mut products = self.inner.products.write().expect("RwLock poisoned");
        products.insert(product.id.as_i32(), product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.inner.products.write().expect("RwLock poisoned");
        let Some(product) = products.get_mut(&id.as_i32()) else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock {
            product.stock = stock.max(0);
        }
        if let Some(category) = update.category {
            product.category = category;
        }
        if let Some(image_url) = update.image_url {
            product.image_url = Some(image_url);
        }
        product.updated_at = Utc::now();

        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.inner.products.write().expect("RwLock poisoned");
        Ok(products.remove(&id.as_i32()).is_some())
    }

    async fn take_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut products = self.inner.products.write().expect("RwLock poisoned");
        let Some(product) = products.get_mut(&id.as_i32()) else {
            return Ok(None);
        };

        // Clamped decrement under the write lock, matching the Postgres
        // single-statement GREATEST(stock - n, 0).
        product.stock = (product.stock - quantity).max(0);
        product.updated_at = Utc::now();
        Ok(Some(product.stock))
    }

    async fn restore_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let mut products = self.inner.products.write().expect("RwLock poisoned");
        let Some(product) = products.get_mut(&id.as_i32()) else {
            return Ok(None);
        };

        product.stock += quantity;
        product.updated_at = Utc::now();
        Ok(Some(product.stock))
    }

    async fn create_order(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderWithLines, RepositoryError> {
        let header = Order {
            id: OrderId::new(Self::next_id(&self.inner.next_order_id)),
            payment_reference: order.payment_reference,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            created_at: Utc::now(),
        };

        {
            let orders = self.inner.orders.read().expect("RwLock poisoned");
            if orders
                .values()
                .any(|o| o.payment_reference == header.payment_reference)
            {
                return Err(RepositoryError::Conflict(
                    "payment reference already exists".to_owned(),
                ));
            }
        }

        let mut stored_lines: Vec<OrderLine> = lines
            .into_iter()
            .map(|line| OrderLine {
                id: OrderLineId::new(Self::next_id(&self.inner.next_line_id)),
                order_id: header.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: line.price_at_purchase,
                product_name: None,
            })
            .collect();

        // Header and lines land together under both write locks.
        let mut orders = self.inner.orders.write().expect("RwLock poisoned");
        let mut all_lines = self.inner.lines.write().expect("RwLock poisoned");
        orders.insert(header.id.as_i32(), header.clone());
        all_lines.insert(header.id.as_i32(), stored_lines.clone());
        drop(all_lines);
        drop(orders);

        self.resolve_names(&mut stored_lines);
        Ok(OrderWithLines {
            order: header,
            lines: stored_lines,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithLines>, RepositoryError> {
        let order = {
            let orders = self.inner.orders.read().expect("RwLock poisoned");
            orders.get(&id.as_i32()).cloned()
        };
        Ok(order.map(|o| self.assemble(o)))
    }

    async fn get_order_by_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<OrderWithLines>, RepositoryError> {
        let order = {
            let orders = self.inner.orders.read().expect("RwLock poisoned");
            orders
                .values()
                .find(|o| o.payment_reference == payment_reference)
                .cloned()
        };
        Ok(order.map(|o| self.assemble(o)))
    }

    async fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<OrderWithLines>, RepositoryError> {
        let mut headers: Vec<Order> = {
            let orders = self.inner.orders.read().expect("RwLock poisoned");
            orders
                .values()
                .filter(|o| owner.is_none_or(|u| o.user_id == u))
                .cloned()
                .collect()
        };
        headers.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_i32().cmp(&a.id.as_i32()))
        });

        Ok(headers.into_iter().map(|o| self.assemble(o)).collect())
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.inner.orders.write().expect("RwLock poisoned");
        match orders.get_mut(&id.as_i32()) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut orders = self.inner.orders.write().expect("RwLock poisoned");
        let mut lines = self.inner.lines.write().expect("RwLock poisoned");
        lines.remove(&id.as_i32());
        Ok(orders.remove(&id.as_i32()).is_some())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let profiles = self.inner.profiles.read().expect("RwLock poisoned");
        Ok(profiles.get(&user_id.as_i32()).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut profiles = self.inner.profiles.write().expect("RwLock poisoned");
        profiles.insert(profile.user_id.as_i32(), profile);
        Ok(())
    }

    async fn set_address(&self, user_id: UserId, address: &str) -> Result<bool, RepositoryError> {
        let mut profiles = self.inner.profiles.write().expect("RwLock poisoned");
        match profiles.get_mut(&user_id.as_i32()) {
            Some(profile) => {
                profile.address = Some(address.to_owned());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let carts = self.inner.carts.read().expect("RwLock poisoned");
        Ok(carts.get(&user_id.as_i32()).cloned().unwrap_or_default())
    }

    async fn save_cart(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let mut carts = self.inner.carts.write().expect("RwLock poisoned");
        carts.insert(user_id.as_i32(), lines.to_vec());
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
