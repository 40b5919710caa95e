pub mod backend;
pub mod controller;
pub mod pricing;
pub mod session;

pub use backend::{
    BotIdChange,
    CurrencyLedger,
    IdRejection,
    RecoveryGateway,
    RecoveryOutcome,
    UserRegistry,
};
pub use controller::{Action, Operation, Reply, SettingsButton, SettingsController, Transition};
pub use pricing::{
    Balances,
    CurrencyKind,
    MenuOptions,
    Offer,
    PaidAction,
    Price,
    SettingsConfig,
};
pub use session::{Actor, Captcha, ChatKind, SettingsSession, SettingsState};
