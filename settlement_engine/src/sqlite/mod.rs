//! SQLite backend for the settlement engine.

pub mod db;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;

/// Embedded schema migrations. Run via [`SqliteDatabase::migrate`].
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
