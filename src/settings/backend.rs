//! Collaborators the settings conversation talks to. Production implementations
//! live in [`crate::telegram::actions::settings`], tests use in-memory fakes.

use async_trait::async_trait;

use super::pricing::{Balances, CurrencyKind};
use crate::entity::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRejection {
    Malformed,
    Taken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotIdChange {
    Accepted(String),
    Rejected(IdRejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Restored { crystals: i64, tokens: i64 },
    NothingFound,
    AlreadyRecovered,
}

#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn find(&self, user_id: i64) -> anyhow::Result<Option<UserModel>>;

    async fn set_nickname(&self, user_id: i64, nickname: &str) -> anyhow::Result<bool>;

    async fn set_bot_id(&self, user_id: i64, bot_id: &str) -> anyhow::Result<BotIdChange>;

    async fn regenerate_bot_id(&self, user_id: i64) -> anyhow::Result<Option<String>>;

    async fn delete_account(&self, user_id: i64) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait CurrencyLedger: Send + Sync {
    async fn balances(&self, user_id: i64) -> anyhow::Result<Balances>;

    /// Subtracts the whole amount or nothing
    async fn subtract(&self, user_id: i64, kind: CurrencyKind, amount: i64)
        -> anyhow::Result<bool>;
}

#[async_trait]
pub trait RecoveryGateway: Send + Sync {
    async fn is_recovered(&self, user_id: i64) -> anyhow::Result<bool>;

    /// Deferred search of the legacy profile, shown in the chat later
    async fn schedule_search(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()>;

    async fn confirm(&self, user_id: i64) -> anyhow::Result<RecoveryOutcome>;
}
