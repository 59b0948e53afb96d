use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    db_types::{NewOrder, Order, OrderNumber, UserId},
    traits::BalanceManagement,
    SqliteDatabase,
};

/// Creates a fresh, migrated database at `url` and returns a handle to it.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

/// A unique database URL in the system temp directory.
pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("lpg_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 25).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    db
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().expect("Database path is not valid UTF-8");
    if Sqlite::database_exists(p).await.unwrap_or(false) {
        if let Err(e) = Sqlite::drop_database(p).await {
            warn!("Error dropping database {p}: {e:?}");
        }
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Opens a balance for `user` and uploads each of the given order numbers on their behalf.
pub async fn seed_orders(db: &SqliteDatabase, user: &str, numbers: &[&str]) -> Vec<Order> {
    let user_id = UserId::from(user);
    db.open_balance(&user_id).await.expect("Error opening balance");
    let mut orders = Vec::with_capacity(numbers.len());
    for n in numbers {
        let order = db
            .insert_order(NewOrder::new(OrderNumber::from(*n), user_id.clone()))
            .await
            .expect("Error seeding order");
        orders.push(order);
    }
    orders
}
