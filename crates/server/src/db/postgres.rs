//! `PostgreSQL` implementation of the [`Store`] trait.
//!
//! Queries are bound at runtime so the crate builds without a live database;
//! row structs derive `FromRow` and convert into domain types via `From`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gilded_core::{Email, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::{RepositoryError, Store};
use crate::cart::CartLine;
use crate::models::{
    NewOrder, NewOrderLine, NewProduct, Order, OrderLine, OrderWithLines, Product, ProductUpdate,
    Profile,
};

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch the lines for a set of order IDs, names weakly resolved.
    async fn lines_for_orders(
        &self,
        order_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<OrderLine>>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT l.id, l.order_id, l.product_id, l.quantity, l.price_at_purchase,
                   p.name AS product_name
            FROM order_lines l
            LEFT JOIN products p ON p.id = l.product_id
            WHERE l.order_id = ANY($1)
            ORDER BY l.id
            ",
        )
        .bind(order_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<i32, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            by_order
                .entry(row.order_id)
                .or_default()
                .push(OrderLine::from(row));
        }
        Ok(by_order)
    }

    /// Assemble an order row with its lines.
    async fn with_lines(&self, row: OrderRow) -> Result<OrderWithLines, RepositoryError> {
        let mut lines = self.lines_for_orders(&[row.id]).await?;
        let lines = lines.remove(&row.id).unwrap_or_default();
        Ok(OrderWithLines {
            order: Order::try_from(row)?,
            lines,
        })
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: i64,
    stock: i32,
    category: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: row.price.into(),
            stock: row.stock,
            category: row.category,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for order header queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    payment_reference: String,
    user_id: i32,
    status: String,
    total_amount: i64,
    shipping_address: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid order status in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            payment_reference: row.payment_reference,
            user_id: UserId::new(row.user_id),
            status,
            total_amount: row.total_amount.into(),
            shipping_address: row.shipping_address,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for order line queries (product name weakly joined).
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    quantity: i32,
    price_at_purchase: i64,
    product_name: Option<String>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
            price_at_purchase: row.price_at_purchase.into(),
            product_name: row.product_name,
        }
    }
}

/// Internal row type for profile queries.
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: i32,
    email: String,
    full_name: Option<String>,
    address: Option<String>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            user_id: UserId::new(row.user_id),
            email,
            full_name: row.full_name,
            address: row.address,
        })
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

#[async_trait]
impl Store for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, category, image_url,
                   created_at, updated_at
            FROM products
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, category, image_url,
                   created_at, updated_at
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn insert_product(&self, input: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO products (name, description, price, stock, category, image_url)
            VALUES ($1, $2, $3, GREATEST($4, 0), $5, $6)
            RETURNING id, name, description, price, stock, category, image_url,
                      created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price.amount())
        .bind(input.stock)
        .bind(&input.category)
        .bind(&input.image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(Product::from(row))
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = GREATEST(COALESCE($5, stock), 0),
                category = COALESCE($6, category),
                image_url = COALESCE($7, image_url),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, price, stock, category, image_url,
                      created_at, updated_at
            ",
        )
        .bind(id.as_i32())
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price.map(|p| p.amount()))
        .bind(update.stock)
        .bind(&update.category)
        .bind(&update.image_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn take_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        // Single conditional write: concurrent checkouts serialize here and
        // the persisted count never goes negative.
        let stock = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE products
            SET stock = GREATEST(stock - $2, 0), updated_at = now()
            WHERE id = $1
            RETURNING stock
            ",
        )
        .bind(id.as_i32())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    async fn restore_stock(
        &self,
        id: ProductId,
        quantity: i32,
    ) -> Result<Option<i32>, RepositoryError> {
        let stock = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE products
            SET stock = stock + $2, updated_at = now()
            WHERE id = $1
            RETURNING stock
            ",
        )
        .bind(id.as_i32())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    async fn create_order(
        &self,
        order: NewOrder,
        lines: Vec<NewOrderLine>,
    ) -> Result<OrderWithLines, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let header = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (payment_reference, user_id, status, total_amount, shipping_address)
            VALUES ($1, $2, 'pending', $3, $4)
            RETURNING id, payment_reference, user_id, status, total_amount,
                      shipping_address, created_at
            ",
        )
        .bind(&order.payment_reference)
        .bind(order.user_id.as_i32())
        .bind(order.total_amount.amount())
        .bind(&order.shipping_address)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("payment reference already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        let mut inserted = Vec::with_capacity(lines.len());
        for line in &lines {
            let row = sqlx::query_as::<_, OrderLineRow>(
                r"
                INSERT INTO order_lines (order_id, product_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4)
                RETURNING id, order_id, product_id, quantity, price_at_purchase,
                          NULL::TEXT AS product_name
                ",
            )
            .bind(header.id)
            .bind(line.product_id.as_i32())
            .bind(line.quantity)
            .bind(line.price_at_purchase.amount())
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(OrderLine::from(row));
        }

        // Resolve names for the freshly created lines before committing.
        let product_ids: Vec<i32> = inserted.iter().map(|l| l.product_id.as_i32()).collect();
        let names: Vec<(i32, String)> =
            sqlx::query_as("SELECT id, name FROM products WHERE id = ANY($1)")
                .bind(product_ids)
                .fetch_all(&mut *tx)
                .await?;
        let names: HashMap<i32, String> = names.into_iter().collect();
        for line in &mut inserted {
            line.product_name = names.get(&line.product_id.as_i32()).cloned();
        }

        tx.commit().await?;

        Ok(OrderWithLines {
            order: Order::try_from(header)?,
            lines: inserted,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderWithLines>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, payment_reference, user_id, status, total_amount,
                   shipping_address, created_at
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_order_by_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<OrderWithLines>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, payment_reference, user_id, status, total_amount,
                   shipping_address, created_at
            FROM orders
            WHERE payment_reference = $1
            ",
        )
        .bind(payment_reference)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<OrderWithLines>, RepositoryError> {
        let rows = match owner {
            Some(user_id) => {
                sqlx::query_as::<_, OrderRow>(
                    r"
                    SELECT id, payment_reference, user_id, status, total_amount,
                           shipping_address, created_at
                    FROM orders
                    WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC
                    ",
                )
                .bind(user_id.as_i32())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(
                    r"
                    SELECT id, payment_reference, user_id, status, total_amount,
                           shipping_address, created_at
                    FROM orders
                    ORDER BY created_at DESC, id DESC
                    ",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.lines_for_orders(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                Ok(OrderWithLines {
                    order: Order::try_from(row)?,
                    lines: order_lines,
                })
            })
            .collect()
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_i32())
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT user_id, email, full_name, address
            FROM profiles
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO profiles (user_id, email, full_name, address)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                address = EXCLUDED.address,
                updated_at = now()
            ",
        )
        .bind(profile.user_id.as_i32())
        .bind(profile.email.as_str())
        .bind(&profile.full_name)
        .bind(&profile.address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_address(&self, user_id: UserId, address: &str) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE profiles SET address = $2, updated_at = now() WHERE user_id = $1")
                .bind(user_id.as_i32())
                .bind(address)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_scalar::<_, String>(
            "SELECT lines FROM cart_cache WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        match lines {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid cart cache for {user_id}: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save_cart(
        &self,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(lines).map_err(|e| {
            RepositoryError::DataCorruption(format!("unserializable cart for {user_id}: {e}"))
        })?;

        sqlx::query(
            r"
            INSERT INTO cart_cache (user_id, lines)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET lines = EXCLUDED.lines, updated_at = now()
            ",
        )
        .bind(user_id.as_i32())
        .bind(json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
