use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use super::OrderStore;
use crate::error::StoreError;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Clone)]
pub struct PgOrderStore {
    pool: DbPool,
}

impl PgOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Loads the items of `rows` in one query and assembles full orders.
async fn with_items(
    conn: &mut AsyncPgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, StoreError> {
    let items = OrderItemRow::belonging_to(&rows)
        .order(order_items::position.asc())
        .load::<OrderItemRow>(conn)
        .await?;

    items
        .grouped_by(&rows)
        .into_iter()
        .zip(rows)
        .map(|(items, row)| Order::try_from((row, items)).map_err(StoreError::Corrupt))
        .collect()
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let order_row = OrderRow::from(order);
        let item_rows: Vec<OrderItemRow> = order
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| OrderItemRow::new(position as i32, item))
            .collect();

        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                diesel::insert_into(orders::table)
                    .values(&order_row)
                    .execute(conn)
                    .await?;

                diesel::insert_into(order_items::table)
                    .values(&item_rows)
                    .execute(conn)
                    .await?;

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row = orders::table
            .find(id)
            .first::<OrderRow>(&mut conn)
            .await
            .optional()?;

        match row {
            Some(row) => Ok(with_items(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = orders::table
            .order(orders::created_at.desc())
            .load::<OrderRow>(&mut conn)
            .await?;

        with_items(&mut conn, rows).await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            orders::table
                .filter(orders::id.eq(id))
                .filter(orders::status.eq(from.as_str())),
        )
        .set((
            orders::status.eq(to.as_str()),
            orders::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

        Ok(updated == 1)
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = orders::table
            .filter(orders::status.eq(OrderStatus::Pending.as_str()))
            .filter(orders::created_at.lt(cutoff))
            .order(orders::created_at.asc())
            .load::<OrderRow>(&mut conn)
            .await?;

        with_items(&mut conn, rows).await
    }
}
