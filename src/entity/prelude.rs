pub use super::legacy_profile::{
    ActiveModel as LegacyProfileActiveModel,
    Column as LegacyProfileColumn,
    Entity as LegacyProfileEntity,
    Model as LegacyProfileModel,
};

pub use super::recovery::{
    ActiveModel as RecoveryActiveModel,
    Column as RecoveryColumn,
    Entity as RecoveryEntity,
    Model as RecoveryModel,
};

pub use super::user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Model as UserModel,
    Role as UserRole,
};

pub use super::user_currency::{
    ActiveModel as UserCurrencyActiveModel,
    Column as UserCurrencyColumn,
    Entity as UserCurrencyEntity,
    Model as UserCurrencyModel,
};
