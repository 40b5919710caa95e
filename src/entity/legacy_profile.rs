use sea_orm::entity::prelude::*;

/// Read-only snapshot of profiles imported from the previous bot database
#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "legacy_profile"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveModel, DeriveActiveModel)]
pub struct Model {
    pub telegram_id: i64,
    pub nickname: String,
    pub crystals: i64,
    pub tokens: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
pub enum Column {
    TelegramId,
    Nickname,
    Crystals,
    Tokens,
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
            Self::Crystals => ColumnType::BigInteger.def(),
            Self::Tokens => ColumnType::BigInteger.def(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
