use sea_orm::prelude::*;
use sea_orm::{ConnectionTrait, DatabaseConnection, PaginatorTrait, Set, TransactionTrait};

use super::CurrencyService;
use crate::entity::prelude::*;
use crate::settings::{CurrencyKind, RecoveryOutcome};
use crate::utils::Clock;

pub struct RecoveryService;

impl RecoveryService {
    pub async fn is_recovered(db: &impl ConnectionTrait, user_id: i64) -> anyhow::Result<bool> {
        let count = RecoveryEntity::find_by_id(user_id).count(db).await?;

        Ok(count > 0)
    }

    pub async fn find_legacy_profile(
        db: &impl ConnectionTrait,
        user_id: i64,
    ) -> anyhow::Result<Option<LegacyProfileModel>> {
        Ok(LegacyProfileEntity::find_by_id(user_id).one(db).await?)
    }

    /// Marks the recovery done and credits legacy balances, all or nothing
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn complete(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> anyhow::Result<RecoveryOutcome> {
        let txn = db.begin().await?;

        if Self::is_recovered(&txn, user_id).await? {
            return Ok(RecoveryOutcome::AlreadyRecovered);
        }

        let Some(profile) = Self::find_legacy_profile(&txn, user_id).await? else {
            return Ok(RecoveryOutcome::NothingFound);
        };

        RecoveryActiveModel {
            telegram_id: Set(user_id),
            recovered_at: Set(Clock::now()),
        }
        .insert(&txn)
        .await?;

        CurrencyService::add(&txn, user_id, CurrencyKind::Crystals, profile.crystals).await?;
        CurrencyService::add(&txn, user_id, CurrencyKind::Tokens, profile.tokens).await?;

        txn.commit().await?;

        tracing::info!(
            crystals = profile.crystals,
            tokens = profile.tokens,
            "Legacy profile recovered"
        );

        Ok(RecoveryOutcome::Restored {
            crystals: profile.crystals,
            tokens: profile.tokens,
        })
    }
}
