use super::Backoffice;
use crate::clock::local_day_bounds;
use crate::error::{CoreError, Result};
use crate::storage::{AccountTransaction, PoolStore, TransactionFilter, TransactionStore};
use crate::types::{Money, TransactionKind};
use crate::validation::Validator;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub betting_pool_id: i64,
    pub kind: TransactionKind,
    pub amount: Money,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub betting_pool_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReport {
    pub transactions: Vec<AccountTransaction>,
    pub total_debits: Money,
    pub total_credits: Money,
    /// Credits minus debits.
    pub net: Money,
}

impl Backoffice {
    /// Move a pool balance. Credits add to the balance and debits subtract.
    /// The pool update and the ledger row commit together.
    pub async fn record_transaction(
        &self,
        request: NewTransaction,
        created_by: i64,
    ) -> Result<AccountTransaction> {
        let mut v = Validator::new();
        v.check(request.amount.is_positive(), "amount", "must be greater than 0")
            .check(
                request.amount <= Money::MAX_AMOUNT,
                "amount",
                "must not exceed 999999999.99",
            )
            .required(&request.description, "description")
            .max_len(&request.description, "description", 250);
        v.finish()?;

        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;
        let pools = PoolStore::new(&tx);

        let pool = pools
            .get(request.betting_pool_id)?
            .ok_or_else(|| CoreError::not_found("Betting pool", request.betting_pool_id))?;
        let config = pools.get_config(pool.id)?;

        let delta = match request.kind {
            TransactionKind::Credit => request.amount,
            TransactionKind::Debit => -request.amount,
        };

        // Debits may not push the balance below the negative credit limit
        if let (TransactionKind::Debit, Some(limit)) = (request.kind, config.credit_limit) {
            let projected = pool
                .balance
                .checked_add(delta)
                .ok_or_else(|| CoreError::invalid("amount", "balance out of range"))?;
            if projected < -limit {
                return Err(CoreError::rule_with(
                    "CREDIT_LIMIT_EXCEEDED",
                    format!("Transaction would exceed the credit limit of {}", limit),
                    json!({
                        "balance": pool.balance,
                        "projected": projected,
                        "creditLimit": limit,
                    }),
                ));
            }
        }

        let now = Utc::now();
        let (initial, final_balance) = pools.adjust_balance(pool.id, delta, now)?;

        let mut record = AccountTransaction {
            id: 0,
            betting_pool_id: pool.id,
            kind: request.kind,
            amount: request.amount,
            initial_balance: initial,
            final_balance,
            description: request.description.trim().to_string(),
            created_by,
            created_at: now,
        };
        record.id = TransactionStore::new(&tx).insert(&record)?;

        if let Some(threshold) = config.deactivation_balance {
            if pool.is_active && final_balance <= threshold {
                let mut pool = pool.clone();
                pool.is_active = false;
                pool.updated_at = now;
                pools.update(&pool)?;
                tracing::warn!(
                    "Betting pool {} deactivated: balance {} reached {}",
                    pool.code,
                    final_balance,
                    threshold
                );
            }
        }

        tx.commit()?;

        tracing::info!(
            "Recorded {} of {} for pool {} ({} -> {})",
            record.kind,
            record.amount,
            pool.code,
            initial,
            final_balance
        );
        Ok(record)
    }

    pub async fn list_transactions(&self, query: TransactionQuery) -> Result<TransactionReport> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if end < start {
                return Err(CoreError::invalid("endDate", "must not be before startDate"));
            }
        }

        let offset = self.config.business_utc_offset_minutes;
        let filter = TransactionFilter {
            betting_pool_id: query.betting_pool_id,
            from: query.start_date.map(|d| local_day_bounds(d, offset).0),
            // Inclusive end day
            to: query
                .end_date
                .map(|d| local_day_bounds(d, offset).1 - chrono::Duration::seconds(1)),
        };

        let transactions = {
            let conn = self.storage.get_connection().await;
            TransactionStore::new(&conn).list(&filter)?
        };

        let total_debits: Money = transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Debit)
            .map(|t| t.amount)
            .sum();
        let total_credits: Money = transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Credit)
            .map(|t| t.amount)
            .sum();

        Ok(TransactionReport {
            transactions,
            total_debits,
            total_credits,
            net: total_credits - total_debits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::{testing, CreatePool, CreateZone};
    use crate::storage::PoolConfig;

    async fn pool(office: &Backoffice, config: PoolConfig) -> i64 {
        let zone = office
            .create_zone(CreateZone {
                name: "Capital".to_string(),
            })
            .await
            .unwrap();
        office
            .create_pool(CreatePool {
                code: None,
                name: "Banca".to_string(),
                zone_id: zone.id,
                address: None,
                phone: None,
                config: Some(config),
            })
            .await
            .unwrap()
            .id
    }

    fn movement(pool_id: i64, kind: TransactionKind, units: i64) -> NewTransaction {
        NewTransaction {
            betting_pool_id: pool_id,
            kind,
            amount: Money::from_units(units),
            description: "Ajuste".to_string(),
        }
    }

    #[tokio::test]
    async fn test_balances_follow_transactions() {
        let office = testing::backoffice().await;
        let pool_id = pool(&office, PoolConfig::default()).await;

        let credit = office
            .record_transaction(movement(pool_id, TransactionKind::Credit, 500), 1)
            .await
            .unwrap();
        assert_eq!(credit.initial_balance, Money::ZERO);
        assert_eq!(credit.final_balance, Money::from_units(500));

        let debit = office
            .record_transaction(movement(pool_id, TransactionKind::Debit, 200), 1)
            .await
            .unwrap();
        assert_eq!(debit.initial_balance, Money::from_units(500));
        assert_eq!(debit.final_balance, Money::from_units(300));
        assert_eq!(
            office.get_pool(pool_id).await.unwrap().balance,
            Money::from_units(300)
        );

        let report = office
            .list_transactions(TransactionQuery {
                betting_pool_id: Some(pool_id),
                ..TransactionQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.total_credits, Money::from_units(500));
        assert_eq!(report.total_debits, Money::from_units(200));
        assert_eq!(report.net, Money::from_units(300));
    }

    #[tokio::test]
    async fn test_credit_limit_blocks_debits() {
        let office = testing::backoffice().await;
        let pool_id = pool(
            &office,
            PoolConfig {
                credit_limit: Some(Money::from_units(100)),
                ..PoolConfig::default()
            },
        )
        .await;

        office
            .record_transaction(movement(pool_id, TransactionKind::Debit, 100), 1)
            .await
            .unwrap();
        let result = office
            .record_transaction(movement(pool_id, TransactionKind::Debit, 1), 1)
            .await;
        match result {
            Err(CoreError::Rule { code, .. }) => assert_eq!(code, "CREDIT_LIMIT_EXCEEDED"),
            other => panic!("unexpected: {:?}", other),
        }

        // The rejected debit left nothing behind
        let report = office.list_transactions(TransactionQuery::default()).await.unwrap();
        assert_eq!(report.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_deactivation_balance() {
        let office = testing::backoffice().await;
        let pool_id = pool(
            &office,
            PoolConfig {
                deactivation_balance: Some(Money::from_units(-50)),
                ..PoolConfig::default()
            },
        )
        .await;

        office
            .record_transaction(movement(pool_id, TransactionKind::Debit, 60), 1)
            .await
            .unwrap();
        assert!(!office.get_pool(pool_id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_balance_overflow_is_rejected() {
        let office = testing::backoffice().await;
        let pool_id = pool(&office, PoolConfig::default()).await;
        {
            let conn = office.storage().get_connection().await;
            PoolStore::new(&conn)
                .adjust_balance(pool_id, Money::from_cents(i64::MAX - 10), Utc::now())
                .unwrap();
        }

        let mut credit = movement(pool_id, TransactionKind::Credit, 0);
        credit.amount = Money::MAX_AMOUNT;
        let result = office.record_transaction(credit, 1).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        // Balance and ledger untouched
        assert_eq!(
            office.get_pool(pool_id).await.unwrap().balance,
            Money::from_cents(i64::MAX - 10)
        );
        let report = office.list_transactions(TransactionQuery::default()).await.unwrap();
        assert!(report.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let office = testing::backoffice().await;
        let result = office
            .record_transaction(movement(1, TransactionKind::Credit, 0), 1)
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let huge: NewTransaction = serde_json::from_value(serde_json::json!({
            "bettingPoolId": 1,
            "kind": "CREDIT",
            "amount": 1e300,
            "description": "Ajuste",
        }))
        .unwrap();
        let result = office.record_transaction(huge, 1).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let result = office
            .list_transactions(TransactionQuery {
                betting_pool_id: None,
                start_date: NaiveDate::from_ymd_opt(2024, 5, 2),
                end_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }
}
