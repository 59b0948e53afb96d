use sqlx::SqliteConnection;

use crate::db_types::{OrderNumber, Points, UserId, Withdrawal};

pub async fn insert_withdrawal(
    user_id: &UserId,
    order_number: &OrderNumber,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<Withdrawal, sqlx::Error> {
    sqlx::query_as("INSERT INTO withdrawals (order_number, user_id, amount) VALUES ($1, $2, $3) RETURNING *")
        .bind(order_number.as_str())
        .bind(user_id.as_str())
        .bind(amount)
        .fetch_one(conn)
        .await
}

pub async fn fetch_withdrawals_for_user(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY processed_at DESC, id DESC")
        .bind(user_id.as_str())
        .fetch_all(conn)
        .await
}
