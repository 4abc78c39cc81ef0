//! Order repository and the `PostgreSQL` fulfillment unit of work.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::instrument;

use shopfront_core::{Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, TrackingId};

use super::catalog::reserve_on;
use super::{conflict_on_unique, count_from_db, count_to_db, email_from_db};
use crate::models::{CustomerInfo, NewOrder, Order, OrderItem, Page, PageRequest};
use crate::store::{FulfillmentTx, OrderStore, Reservation, StatusUpdate, StoreError};

const ORDER_COLUMNS: &str = "id, tracking_id, customer_name, customer_phone, customer_email, \
     customer_address, total_amount, status, created_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    tracking_id: TrackingId,
    customer_name: String,
    customer_phone: String,
    customer_email: Option<String>,
    customer_address: String,
    total_amount: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Money,
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity: count_from_db(row.quantity, "quantity")?,
            unit_price: row.unit_price,
        })
    }
}

fn assemble(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let email = row
        .customer_email
        .as_deref()
        .map(email_from_db)
        .transpose()?;

    Ok(Order {
        id: row.id,
        tracking_id: row.tracking_id,
        customer: CustomerInfo {
            name: row.customer_name,
            phone: row.customer_phone,
            email,
            address: row.customer_address,
        },
        total_amount: row.total_amount,
        status: row.status,
        created_at: row.created_at,
        items,
    })
}

/// Attach items (in position order) to a batch of order headers.
async fn with_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
    let item_rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT id, order_id, product_id, quantity, unit_price
        FROM shop.order_item
        WHERE order_id = ANY($1)
        ORDER BY order_id, position
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items
            .entry(row.order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            assemble(row, order_items)
        })
        .collect()
}

/// How to find a single order.
enum OrderKey<'a> {
    Id(OrderId),
    Tracking(&'a TrackingId),
}

async fn fetch_order(
    conn: &mut PgConnection,
    key: OrderKey<'_>,
) -> Result<Option<Order>, StoreError> {
    let row = match key {
        OrderKey::Id(id) => {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        }
        OrderKey::Tracking(tracking_id) => {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE tracking_id = $1"
            ))
            .bind(tracking_id)
            .fetch_optional(&mut *conn)
            .await?
        }
    };

    match row {
        Some(row) => Ok(with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

// =============================================================================
// Unit of work
// =============================================================================

/// An open transaction covering one order submission.
///
/// Dropping it without `commit` rolls the transaction back, which undoes
/// every stock decrement made through it.
pub struct PgFulfillmentTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl FulfillmentTx for PgFulfillmentTx {
    async fn reserve(
        &mut self,
        product: ProductId,
        quantity: u32,
    ) -> Result<Reservation, StoreError> {
        reserve_on(&mut *self.tx, product, quantity).await
    }

    #[instrument(skip(self, order), fields(tracking_id = %order.tracking_id))]
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, StoreError> {
        let header = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.customer_order
                (tracking_id, customer_name, customer_phone, customer_email,
                 customer_address, total_amount, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&order.tracking_id)
        .bind(&order.customer.name)
        .bind(&order.customer.phone)
        .bind(order.customer.email.as_ref().map(Email::as_str))
        .bind(&order.customer.address)
        .bind(order.total_amount)
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| conflict_on_unique(e, "tracking id"))?;

        let mut items = Vec::with_capacity(order.lines.len());
        for (position, line) in (0_i32..).zip(&order.lines) {
            let id = sqlx::query_scalar::<_, OrderItemId>(
                r"
                INSERT INTO shop.order_item (order_id, position, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                ",
            )
            .bind(header.id)
            .bind(position)
            .bind(line.product_id)
            .bind(count_to_db(line.quantity)?)
            .bind(line.unit_price)
            .fetch_one(&mut *self.tx)
            .await?;

            items.push(OrderItem {
                id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        assemble(header, items)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for `shop.customer_order` and `shop.order_item`.
#[derive(Debug, Clone)]
pub struct PgOrders {
    pool: PgPool,
}

impl PgOrders {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrders {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgFulfillmentTx { tx }))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, OrderKey::Id(id)).await
    }

    async fn find_by_tracking_id(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, OrderKey::Tracking(tracking_id)).await
    }

    async fn tracking_id_exists(&self, tracking_id: &TrackingId) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.customer_order WHERE tracking_id = $1)",
        )
        .bind(tracking_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.customer_order
            WHERE lower(customer_email) = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(email.as_str())
        .fetch_all(&mut *conn)
        .await?;

        with_items(&mut conn, rows).await
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let limit = i64::from(page.size());
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop.customer_order
            WHERE $1::shop.order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r"
            SELECT count(*)
            FROM shop.customer_order
            WHERE $1::shop.order_status IS NULL OR status = $1
            ",
        )
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Page {
            items: with_items(&mut conn, rows).await?,
            page: page.page(),
            size: page.size(),
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        release_stock: bool,
    ) -> Result<StatusUpdate, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_scalar::<_, OrderId>(
            r"
            UPDATE shop.customer_order
            SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id
            ",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            let current = sqlx::query_scalar::<_, OrderStatus>(
                "SELECT status FROM shop.customer_order WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            return Ok(current.map_or(StatusUpdate::NotFound, |current| {
                StatusUpdate::Stale { current }
            }));
        }

        if release_stock {
            sqlx::query(
                r"
                UPDATE shop.product AS p
                SET stock = p.stock + i.quantity, updated_at = now()
                FROM (
                    SELECT product_id, SUM(quantity)::int AS quantity
                    FROM shop.order_item
                    WHERE order_id = $1
                    GROUP BY product_id
                ) AS i
                WHERE p.id = i.product_id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let order = fetch_order(&mut tx, OrderKey::Id(id))
            .await?
            .ok_or_else(|| StoreError::DataCorruption(format!("order {id} vanished mid-update")))?;

        tx.commit().await?;
        Ok(StatusUpdate::Applied(order))
    }
}
