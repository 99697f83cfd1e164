pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use sqlx;

pub use db::init_db;
pub use error::LedgerError;
