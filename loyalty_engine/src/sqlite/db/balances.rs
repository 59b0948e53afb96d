use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Balance, Points, UserId};

/// Creates an empty balance for the user if none exists, and returns the stored balance.
pub async fn open_balance(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Balance, sqlx::Error> {
    sqlx::query("INSERT INTO balances (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.as_str())
        .execute(&mut *conn)
        .await?;
    sqlx::query_as("SELECT * FROM balances WHERE user_id = $1").bind(user_id.as_str()).fetch_one(conn).await
}

pub async fn fetch_balance(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Option<Balance>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM balances WHERE user_id = $1").bind(user_id.as_str()).fetch_optional(conn).await
}

/// Adds `amount` to the user's current balance. Returns `false` if the user has no balance.
pub async fn credit_balance(
    user_id: &UserId,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE balances SET current = current + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2",
    )
    .bind(amount)
    .bind(user_id.as_str())
    .execute(conn)
    .await?;
    let updated = result.rows_affected() > 0;
    if updated {
        debug!("🗃️ Credited {amount} points to {user_id}");
    }
    Ok(updated)
}

/// Moves `amount` from the user's current balance to their withdrawn total. Returns the updated balance, or `None` if
/// the user has no balance. Overdrawing violates the table's check constraint and is reported as a database error.
pub async fn debit_balance(
    user_id: &UserId,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<Option<Balance>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE balances SET
                current = current - $1,
                withdrawn = withdrawn + $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $2
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(user_id.as_str())
    .fetch_optional(conn)
    .await
}
