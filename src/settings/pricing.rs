use chrono::{DateTime, TimeZone as _, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{AsRefStr, EnumIter};

use crate::entity::prelude::*;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum CurrencyKind {
    Crystals,
    Tokens,
}

impl CurrencyKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Crystals => "💎",
            Self::Tokens => "🪙",
        }
    }
}

/// Things that cost money in settings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum PaidAction {
    #[display("nickname")]
    Nickname,
    #[display("bot_id")]
    BotId,
}

/// Cost of an action in every accepted currency. Paying means paying the full
/// amount in exactly one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Price {
    pub crystals: i64,
    pub tokens: i64,
}

impl Price {
    pub const fn new(crystals: i64, tokens: i64) -> Self {
        Self { crystals, tokens }
    }

    pub fn amount(&self, kind: CurrencyKind) -> i64 {
        match kind {
            CurrencyKind::Crystals => self.crystals,
            CurrencyKind::Tokens => self.tokens,
        }
    }

    /// Currencies in which the whole price fits into the balance
    pub fn affordable(&self, balances: &Balances) -> Vec<CurrencyKind> {
        CurrencyKind::iter()
            .filter(|kind| balances.get(*kind) >= self.amount(*kind))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Balances {
    pub crystals: i64,
    pub tokens: i64,
}

impl Balances {
    pub fn get(&self, kind: CurrencyKind) -> i64 {
        match kind {
            CurrencyKind::Crystals => self.crystals,
            CurrencyKind::Tokens => self.tokens,
        }
    }

    pub fn get_mut(&mut self, kind: CurrencyKind) -> &mut i64 {
        match kind {
            CurrencyKind::Crystals => &mut self.crystals,
            CurrencyKind::Tokens => &mut self.tokens,
        }
    }
}

impl From<UserCurrencyModel> for Balances {
    fn from(model: UserCurrencyModel) -> Self {
        Self {
            crystals: model.crystals,
            tokens: model.tokens,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Offer {
    Free,
    Paid(Vec<CurrencyKind>),
}

impl Offer {
    /// `None` means the action is not offered at all
    pub fn for_role(role: &UserRole, balances: &Balances, price: &Price) -> Option<Self> {
        if role.is_privileged() {
            return Some(Self::Free);
        }

        let affordable = price.affordable(balances);

        if affordable.is_empty() {
            return None;
        }

        Some(Self::Paid(affordable))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuOptions {
    pub nickname: Option<Offer>,
    pub bot_id: Option<Offer>,
    pub recovery: bool,
}

#[derive(Clone, Debug)]
pub struct SettingsConfig {
    pub nickname_price: Price,
    pub bot_id_price: Price,
    pub max_captcha_attempts: u8,
    pub max_nickname_len: usize,
    pub recovery_cutoff: DateTime<Utc>,
}

pub const NICKNAME_CHANGE_PRICE: Price = Price::new(1000, 100);
pub const BOT_ID_CHANGE_PRICE: Price = Price::new(1000, 100);
pub const MAX_CAPTCHA_ATTEMPTS: u8 = 3;
pub const MAX_NICKNAME_LEN: usize = 50;

impl SettingsConfig {
    pub fn new(recovery_cutoff: DateTime<Utc>) -> Self {
        Self {
            nickname_price: NICKNAME_CHANGE_PRICE,
            bot_id_price: BOT_ID_CHANGE_PRICE,
            max_captcha_attempts: MAX_CAPTCHA_ATTEMPTS,
            max_nickname_len: MAX_NICKNAME_LEN,
            recovery_cutoff,
        }
    }

    pub fn default_recovery_cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn price(&self, action: PaidAction) -> &Price {
        match action {
            PaidAction::Nickname => &self.nickname_price,
            PaidAction::BotId => &self.bot_id_price,
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self::new(Self::default_recovery_cutoff())
    }
}

pub fn recovery_visible(
    already_recovered: bool,
    created_at: DateTime<Utc>,
    cutoff: DateTime<Utc>,
) -> bool {
    !already_recovered && created_at < cutoff
}

/// Everything the main menu offers, computed from fresh data on every render
pub fn evaluate(
    config: &SettingsConfig,
    user: &UserModel,
    balances: &Balances,
    already_recovered: bool,
) -> MenuOptions {
    MenuOptions {
        nickname: Offer::for_role(&user.role, balances, &config.nickname_price),
        bot_id: Offer::for_role(&user.role, balances, &config.bot_id_price),
        recovery: recovery_visible(
            already_recovered,
            user.created_at_utc(),
            config.recovery_cutoff,
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn user(role: UserRole, created_at: DateTime<Utc>) -> UserModel {
        UserModel {
            telegram_id: 1,
            nickname: "neo".into(),
            username: None,
            quote: None,
            bot_id: "AB12".into(),
            role,
            created_at: created_at.naive_utc(),
            updated_at: created_at.naive_utc(),
        }
    }

    #[test]
    fn tester_can_only_pay_with_what_is_enough() {
        let balances = Balances {
            crystals: 1500,
            tokens: 50,
        };

        assert_eq!(
            NICKNAME_CHANGE_PRICE.affordable(&balances),
            vec![CurrencyKind::Crystals]
        );

        assert_eq!(
            Offer::for_role(&UserRole::Tester, &balances, &NICKNAME_CHANGE_PRICE),
            Some(Offer::Paid(vec![CurrencyKind::Crystals]))
        );
    }

    #[test]
    fn exact_amount_is_enough() {
        let balances = Balances {
            crystals: 999,
            tokens: 100,
        };

        assert_eq!(
            NICKNAME_CHANGE_PRICE.affordable(&balances),
            vec![CurrencyKind::Tokens]
        );
    }

    #[test]
    fn poor_user_is_not_offered() {
        let balances = Balances {
            crystals: 999,
            tokens: 99,
        };

        assert_eq!(
            Offer::for_role(&UserRole::User, &balances, &NICKNAME_CHANGE_PRICE),
            None
        );
    }

    #[test]
    fn dev_is_offered_for_free() {
        assert_eq!(
            Offer::for_role(&UserRole::Dev, &Balances::default(), &BOT_ID_CHANGE_PRICE),
            Some(Offer::Free)
        );
    }

    #[test]
    fn recovery_visible_only_before_cutoff() {
        let cutoff = SettingsConfig::default_recovery_cutoff();

        assert!(recovery_visible(false, cutoff - Duration::seconds(1), cutoff));
        assert!(!recovery_visible(false, cutoff, cutoff));
        assert!(!recovery_visible(false, cutoff + Duration::seconds(1), cutoff));
    }

    #[test]
    fn recovery_hidden_when_already_recovered() {
        let cutoff = SettingsConfig::default_recovery_cutoff();

        assert!(!recovery_visible(true, cutoff - Duration::days(30), cutoff));
    }

    #[test]
    fn evaluate_builds_full_menu() {
        let config = SettingsConfig::default();
        let old_user = user(UserRole::Tester, config.recovery_cutoff - Duration::days(1));

        let options = evaluate(
            &config,
            &old_user,
            &Balances {
                crystals: 0,
                tokens: 250,
            },
            false,
        );

        assert_eq!(
            options,
            MenuOptions {
                nickname: Some(Offer::Paid(vec![CurrencyKind::Tokens])),
                bot_id: Some(Offer::Paid(vec![CurrencyKind::Tokens])),
                recovery: true,
            }
        );
    }
}
