use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, Set, UpdateMany};

use crate::entity::prelude::*;
use crate::settings::{Balances, CurrencyKind};

pub struct CurrencyService;

impl CurrencyService {
    fn column(kind: CurrencyKind) -> UserCurrencyColumn {
        match kind {
            CurrencyKind::Crystals => UserCurrencyColumn::Crystals,
            CurrencyKind::Tokens => UserCurrencyColumn::Tokens,
        }
    }

    /// Missing row means zero balances
    pub async fn balances(db: &impl ConnectionTrait, user_id: i64) -> anyhow::Result<Balances> {
        let balances = UserCurrencyEntity::find_by_id(user_id)
            .one(db)
            .await?
            .map(Balances::from)
            .unwrap_or_default();

        Ok(balances)
    }

    /// Single conditional UPDATE: either the whole amount is taken or nothing
    #[tracing::instrument(skip_all, fields(user_id, currency = kind.as_ref(), amount))]
    pub async fn subtract(
        db: &impl ConnectionTrait,
        user_id: i64,
        kind: CurrencyKind,
        amount: i64,
    ) -> anyhow::Result<bool> {
        if amount < 0 {
            anyhow::bail!("Negative amount {amount} can't be subtracted");
        }

        let column = Self::column(kind);
        let query: UpdateMany<_> = UserCurrencyEntity::update_many();

        let res = query
            .col_expr(column, Expr::col(column).sub(amount))
            .filter(UserCurrencyColumn::TelegramId.eq(user_id))
            .filter(column.gte(amount))
            .exec(db)
            .await?;

        Ok(res.rows_affected == 1)
    }

    #[tracing::instrument(skip_all, fields(user_id, currency = kind.as_ref(), amount))]
    pub async fn add(
        db: &impl ConnectionTrait,
        user_id: i64,
        kind: CurrencyKind,
        amount: i64,
    ) -> anyhow::Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let column = Self::column(kind);
        let query: UpdateMany<_> = UserCurrencyEntity::update_many();

        let res = query
            .col_expr(column, Expr::col(column).add(amount))
            .filter(UserCurrencyColumn::TelegramId.eq(user_id))
            .exec(db)
            .await?;

        if res.rows_affected > 0 {
            return Ok(());
        }

        let mut balances = Balances::default();
        *balances.get_mut(kind) = amount;

        UserCurrencyActiveModel {
            telegram_id: Set(user_id),
            crystals: Set(balances.crystals),
            tokens: Set(balances.tokens),
        }
        .insert(db)
        .await?;

        Ok(())
    }
}
