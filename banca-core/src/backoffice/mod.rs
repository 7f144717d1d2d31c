//! Back-office service layer: catalog administration, users, balances and
//! sales reporting over [`Storage`].

mod contacts;
mod draw_prizes;
mod hot_numbers;
mod lotteries;
mod pools;
mod reports;
mod transactions;
mod users;
mod winning_plays;
mod zones;

pub use contacts::{ContactQuery, CreateContact, UpdateContact};
pub use draw_prizes::{
    BatchDrawPrizes, BatchDrawPrizesOutcome, DrawPrizeEntry, PrizeSource, ResolvedPrize,
    SaveDrawPrizes, SavedDrawPrizes,
};
pub use hot_numbers::{CreateHotNumberLimit, HotNumbers, UpdateHotNumberLimit, UpdateHotNumbers};
pub use lotteries::{CreateDraw, CreateLottery, UpdateDraw, UpdateLottery};
pub use pools::{CreatePool, PoolQuery, UpdatePool, UpsertPoolDraw, UpsertPrize};
pub use reports::{
    fall_amount, DailySummary, DrawSalesRow, PoolSalesRow, SalesFilter, SalesReport, SalesSummary,
    ZoneSalesReport, ZoneSalesRow,
};
pub use transactions::{NewTransaction, TransactionQuery, TransactionReport};
pub use users::{ChangePassword, CreateUser, LoginRequest, LoginResponse, UpdateUser, UserQuery};
pub use winning_plays::{WinningPlayFilter, WinningPlayParams, WinningPlaysReport};
pub use zones::{CreateZone, UpdateZone, ZoneQuery};

use crate::auth::TokenSigner;
use crate::cache::MemoryCache;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::reservation::LimitReservations;
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Duration;

pub struct Backoffice {
    storage: Arc<Storage>,
    cache: MemoryCache,
    notifier: Notifier,
    signer: TokenSigner,
    reservations: Arc<LimitReservations>,
    config: ServiceConfig,
}

impl Backoffice {
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::new(&config.database_path).await?);
        tracing::info!("Opened database at {}", config.database_path.display());
        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: ServiceConfig, storage: Arc<Storage>) -> Self {
        Self {
            storage,
            cache: MemoryCache::new(Duration::from_secs(config.cache_ttl_secs)),
            notifier: Notifier::default(),
            signer: TokenSigner::new(&config.jwt),
            reservations: Arc::new(LimitReservations::new(Duration::from_secs(
                config.reservation_ttl_secs,
            ))),
            config,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn reservations(&self) -> &Arc<LimitReservations> {
        &self.reservations
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.jwt.secret = "unit-test-secret-0123456789abcdef".to_string();
        config
    }

    pub async fn backoffice() -> Backoffice {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        Backoffice::with_storage(config(), storage)
    }
}
