use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType, Points, UserId},
    traits::BalanceApiError,
};

/// Inserts a freshly uploaded order with status `New`.
///
/// If the order number is already taken, the error distinguishes between the same user uploading it twice and a
/// different user claiming it.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, BalanceApiError> {
    let result = sqlx::query_as("INSERT INTO orders (number, user_id) VALUES ($1, $2) RETURNING *")
        .bind(order.number.as_str())
        .bind(order.user_id.as_str())
        .fetch_one(&mut *conn)
        .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_order_by_number(&order.number, conn).await?;
            match existing {
                Some(o) if o.user_id == order.user_id => Err(BalanceApiError::OrderAlreadyUploaded(order.number)),
                _ => Err(BalanceApiError::OrderOwnedByAnotherUser(order.number)),
            }
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE number = $1").bind(number.as_str()).fetch_optional(conn).await
}

pub async fn fetch_orders_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY uploaded_at DESC, id DESC")
        .bind(user_id.as_str())
        .fetch_all(conn)
        .await
}

/// Fetches up to `limit` orders that are still waiting for a verdict, least recently updated first.
pub async fn fetch_pending_orders(limit: u32, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY updated_at ASC, id ASC
            LIMIT $1
        "#,
    )
    .bind(i64::from(limit))
    .fetch_all(conn)
    .await?;
    trace!("🗃️ Fetched {} pending orders", orders.len());
    Ok(orders)
}

/// Sets the status and accrual of the order, but only if the order is not already in a terminal state.
///
/// Returns `None` if no row was updated, either because the order does not exist or because it has already been
/// settled.
pub async fn update_pending_order(
    number: &OrderNumber,
    status: OrderStatusType,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, accrual = $2, updated_at = CURRENT_TIMESTAMP
            WHERE number = $3 AND status IN ('NEW', 'PROCESSING')
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(accrual)
    .bind(number.as_str())
    .fetch_optional(conn)
    .await?;
    if let Some(o) = &order {
        debug!("🗃️ Order {} is now {} with accrual {}", o.number, o.status, o.accrual);
    }
    Ok(order)
}
