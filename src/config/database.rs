//! Database configuration module for the credit desk.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`
//! and created with `IF NOT EXISTS`, so calling [`create_tables`] on every start is safe.

use crate::entities::{Code, Payment, User};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/credit_desk.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    connect(&get_database_url()).await
}

/// Connects to an explicit database URL.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    tracing::debug!("Connecting to database at {database_url}");
    ensure_sqlite_dir(database_url)?;
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Creates the users, payments and codes tables if they are missing.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut user_table = schema.create_table_from_entity(User);
    let mut payment_table = schema.create_table_from_entity(Payment);
    let mut code_table = schema.create_table_from_entity(Code);

    user_table.if_not_exists();
    payment_table.if_not_exists();
    code_table.if_not_exists();

    db.execute(builder.build(&user_table)).await?;
    db.execute(builder.build(&payment_table)).await?;
    db.execute(builder.build(&code_table)).await?;

    Ok(())
}
