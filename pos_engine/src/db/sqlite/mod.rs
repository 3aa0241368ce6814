//! # SQLite backend
//!
//! "Low-level" queries live in [`pending_requests`] and [`reconciliation`] as plain functions that accept a
//! `&mut SqliteConnection`. Callers can hand them a pooled connection or an open transaction without any other
//! changes. [`SqliteDatabase`] wires them up behind the [`crate::db::PendingStore`] trait.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use crate::db::PendingStoreError;

pub mod pending_requests;
pub mod reconciliation;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

const SQLITE_DB_URL: &str = "sqlite://data/pos_terminal.db";

pub fn db_url() -> String {
    let result = env::var("POS_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ POS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool, creating the database file if it does not exist yet.
///
/// WAL journaling plus `synchronous = FULL` means a committed write survives process death and power loss.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, PendingStoreError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
