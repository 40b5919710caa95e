pub mod legacy_profile;
pub mod prelude;
pub mod recovery;
pub mod user;
pub mod user_currency;
