use std::future::Future;
use std::sync::LazyLock;

use rand::Rng as _;
use regex::Regex;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ConnectionTrait,
    DatabaseConnection,
    PaginatorTrait,
    Set,
    SqlErr,
    TransactionTrait,
    UpdateMany,
};

use crate::entity::prelude::*;
use crate::settings::pricing::MAX_NICKNAME_LEN;
use crate::settings::{BotIdChange, IdRejection};
use crate::utils::{Clock, StringUtils as _};

pub const BOT_ID_LEN: usize = 4;
const BOT_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const BOT_ID_GENERATION_ATTEMPTS: usize = 20;

static BOT_ID_FORMAT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{4}$"));

pub struct UserService;

impl UserService {
    pub fn valid_bot_id(bot_id: &str) -> bool {
        BOT_ID_FORMAT
            .as_ref()
            .map(|re| re.is_match(bot_id))
            .unwrap_or(false)
    }

    pub fn random_bot_id() -> String {
        let mut rng = rand::rng();

        (0..BOT_ID_LEN)
            .map(|_| BOT_ID_CHARSET[rng.random_range(0..BOT_ID_CHARSET.len())] as char)
            .collect()
    }

    pub async fn find(
        db: &impl ConnectionTrait,
        user_id: i64,
    ) -> anyhow::Result<Option<UserModel>> {
        Ok(UserEntity::find_by_id(user_id).one(db).await?)
    }

    pub async fn bot_id_taken(
        db: &impl ConnectionTrait,
        user_id: i64,
        bot_id: &str,
    ) -> anyhow::Result<bool> {
        let count = UserEntity::find()
            .filter(UserColumn::BotId.eq(bot_id))
            .filter(UserColumn::TelegramId.ne(user_id))
            .count(db)
            .await?;

        Ok(count > 0)
    }

    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn set_nickname(
        db: &impl ConnectionTrait,
        user_id: i64,
        nickname: &str,
    ) -> anyhow::Result<bool> {
        let query: UpdateMany<_> = UserEntity::update_many();

        let res = query
            .col_expr(UserColumn::Nickname, Expr::value(nickname))
            .col_expr(UserColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(UserColumn::TelegramId.eq(user_id))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    #[tracing::instrument(skip_all, fields(user_id, bot_id))]
    pub async fn set_bot_id(
        db: &impl ConnectionTrait,
        user_id: i64,
        bot_id: &str,
    ) -> anyhow::Result<BotIdChange> {
        if !Self::valid_bot_id(bot_id) {
            return Ok(BotIdChange::Rejected(IdRejection::Malformed));
        }

        if Self::bot_id_taken(db, user_id, bot_id).await? {
            return Ok(BotIdChange::Rejected(IdRejection::Taken));
        }

        match Self::update_bot_id(db, user_id, bot_id).await {
            Ok(true) => Ok(BotIdChange::Accepted(bot_id.to_owned())),
            Ok(false) => anyhow::bail!("User {user_id} vanished while changing bot id"),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(BotIdChange::Rejected(IdRejection::Taken))
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Assigns a random free ID. `None` when no free ID was found
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn regenerate_bot_id(
        db: &impl ConnectionTrait,
        user_id: i64,
    ) -> anyhow::Result<Option<String>> {
        for _ in 0..BOT_ID_GENERATION_ATTEMPTS {
            let bot_id = Self::random_bot_id();

            if Self::bot_id_taken(db, user_id, &bot_id).await? {
                continue;
            }

            match Self::update_bot_id(db, user_id, &bot_id).await {
                Ok(true) => return Ok(Some(bot_id)),
                Ok(false) => return Ok(None),
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    continue
                },
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!("Failed to find a free bot id");

        Ok(None)
    }

    async fn update_bot_id(
        db: &impl ConnectionTrait,
        user_id: i64,
        bot_id: &str,
    ) -> Result<bool, DbErr> {
        let query: UpdateMany<_> = UserEntity::update_many();

        let res = query
            .col_expr(UserColumn::BotId, Expr::value(bot_id))
            .col_expr(UserColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(UserColumn::TelegramId.eq(user_id))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    /// Random ID that `is_taken` rejects for none of the attempts
    async fn pick_bot_id<F, Fut>(mut is_taken: F) -> anyhow::Result<Option<String>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<bool>>,
    {
        for _ in 0..BOT_ID_GENERATION_ATTEMPTS {
            let bot_id = Self::random_bot_id();

            if !is_taken(bot_id.clone()).await? {
                return Ok(Some(bot_id));
            }
        }

        Ok(None)
    }

    /// Returns the user and whether it was created just now
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn register(
        db: &DatabaseConnection,
        user_id: i64,
        nickname: &str,
        username: Option<&str>,
    ) -> anyhow::Result<(UserModel, bool)> {
        if let Some(user) = Self::find(db, user_id).await? {
            return Ok((user, false));
        }

        let txn = db.begin().await?;
        let conn = &txn;

        let bot_id = Self::pick_bot_id(|bot_id| async move {
            Self::bot_id_taken(conn, user_id, &bot_id).await
        })
        .await?;

        let Some(bot_id) = bot_id else {
            anyhow::bail!(
                "No free bot id for user {user_id} after {BOT_ID_GENERATION_ATTEMPTS} attempts"
            );
        };

        let user = UserActiveModel {
            telegram_id: Set(user_id),
            nickname: Set(nickname.chars_crop(MAX_NICKNAME_LEN)),
            username: Set(username.map(ToOwned::to_owned)),
            quote: Set(None),
            bot_id: Set(bot_id),
            role: Set(UserRole::User),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                anyhow::anyhow!("User {user_id} or bot id was registered concurrently")
            },
            _ => err.into(),
        })?;

        UserCurrencyActiveModel {
            telegram_id: Set(user_id),
            crystals: Set(0),
            tokens: Set(0),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::info!(bot_id = %user.bot_id, "User registered");

        Ok((user, true))
    }

    /// Balances go away with the user by cascade
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn delete_account(db: &impl ConnectionTrait, user_id: i64) -> anyhow::Result<bool> {
        let res = UserEntity::delete_by_id(user_id).exec(db).await?;

        Ok(res.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_id_format() {
        assert!(UserService::valid_bot_id("AB12"));
        assert!(UserService::valid_bot_id("0000"));
        assert!(!UserService::valid_bot_id("ab12"));
        assert!(!UserService::valid_bot_id("ABC"));
        assert!(!UserService::valid_bot_id("ABCDE"));
        assert!(!UserService::valid_bot_id("AB-1"));
        assert!(!UserService::valid_bot_id("АБВГ"));
    }

    #[tokio::test]
    async fn bot_id_pick_skips_taken_ones() {
        let mut checks = 0;

        let bot_id = UserService::pick_bot_id(|_| {
            checks += 1;
            let taken = checks <= 3;

            async move { Ok(taken) }
        })
        .await
        .unwrap();

        assert!(bot_id.is_some_and(|bot_id| UserService::valid_bot_id(&bot_id)));
        assert_eq!(checks, 4);
    }

    #[tokio::test]
    async fn bot_id_pick_gives_up_when_everything_is_taken() {
        let mut checks = 0;

        let bot_id = UserService::pick_bot_id(|_| {
            checks += 1;

            async { Ok(true) }
        })
        .await
        .unwrap();

        assert_eq!(bot_id, None);
        assert_eq!(checks, BOT_ID_GENERATION_ATTEMPTS);
    }

    #[test]
    fn random_bot_id_is_valid() {
        for _ in 0..100 {
            assert!(UserService::valid_bot_id(&UserService::random_bot_id()));
        }
    }
}
