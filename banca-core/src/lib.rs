//! Banca core - entities, storage and back-office services for a lottery
//! betting-pool operation.
//!
//! This library owns the SQLite schema, authentication, the notification bus
//! and the [`Backoffice`] facade used by the API and the CLI.

pub mod auth;
pub mod backoffice;
pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod reservation;
pub mod storage;
pub mod types;
pub mod validation;

pub use auth::{Claims, TokenSigner};
pub use backoffice::Backoffice;
pub use catalog::{permissions, BetType};
pub use config::ServiceConfig;
pub use error::{CoreError, FieldError, Result};
pub use notify::{Audience, Event, Notifier};
pub use storage::Storage;
pub use types::{Money, Page, PageRequest};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_backoffice_on_disk() {
        let temp_dir = tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.jwt.secret = "unit-test-secret-0123456789abcdef".to_string();
        config.database_path = temp_dir.path().join("data").join("banca.db");

        let office = Backoffice::new(config.clone()).await.unwrap();
        let admin = office.bootstrap_admin("admin", "admin123").await.unwrap();
        assert!(admin.is_some());
        drop(office);

        // Reopening keeps the data and the schema stays valid
        let office = Backoffice::new(config).await.unwrap();
        assert!(office.bootstrap_admin("admin", "admin123").await.unwrap().is_none());
    }
}
