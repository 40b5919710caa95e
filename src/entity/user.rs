use std::str::FromStr;

use sea_orm::entity::prelude::*;
use sea_orm::prelude::async_trait::async_trait;
use sea_orm::Set;

use crate::utils::Clock;

#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "user"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveModel, DeriveActiveModel)]
pub struct Model {
    pub telegram_id: i64,
    pub nickname: String,
    pub username: Option<String>,
    pub quote: Option<String>,
    pub bot_id: String,
    pub role: Role,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl Model {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    pub fn created_at_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at.and_utc()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = Set(Clock::now());
        if insert {
            self.created_at = Set(Clock::now());
        }

        Ok(self)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
pub enum Column {
    TelegramId,
    Nickname,
    Username,
    Quote,
    BotId,
    Role,
    CreatedAt,
    UpdatedAt,
}

#[derive(Copy, Clone, Debug, EnumIter, DerivePrimaryKey)]
pub enum PrimaryKey {
    TelegramId,
}

impl PrimaryKeyTrait for PrimaryKey {
    type ValueType = i64;

    fn auto_increment() -> bool {
        false
    }
}

impl ColumnTrait for Column {
    type EntityName = Entity;

    fn def(&self) -> ColumnDef {
        match self {
            Self::TelegramId => ColumnType::BigInteger.def(),
            Self::Nickname => ColumnType::Text.def(),
            Self::Username => ColumnType::Text.def().null(),
            Self::Quote => ColumnType::Text.def().null(),
            Self::BotId => ColumnType::Text.def().unique(),
            Self::Role => Role::db_type(),
            Self::CreatedAt => ColumnType::DateTime.def(),
            Self::UpdatedAt => ColumnType::DateTime.def(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_currency::Entity")]
    UserCurrency,
}

impl Related<super::user_currency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCurrency.def()
    }
}

#[derive(Debug, Clone, EnumIter, DeriveActiveEnum, PartialEq, Eq, Default)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    #[default]
    User,
    #[sea_orm(string_value = "tester")]
    Tester,
    #[sea_orm(string_value = "dev")]
    Dev,
}

impl FromStr for Role {
    type Err = sea_orm::DbErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&str> for Role {
    type Error = sea_orm::DbErr;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_value(&value.to_owned())
    }
}

impl Role {
    /// Privileged roles skip payment for nickname and ID changes
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dev_is_privileged() {
        assert!(Role::Dev.is_privileged());
        assert!(!Role::Tester.is_privileged());
        assert!(!Role::User.is_privileged());
    }

    #[test]
    fn role_parses_from_db_value() {
        assert_eq!(Role::from_str("tester").ok(), Some(Role::Tester));
        assert!(Role::from_str("admin").is_err());
    }
}
