use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardButtonKind};

use crate::settings::SettingsButton;

/// Telegram limit for callback data
pub const CALLBACK_DATA_MAX_LEN: usize = 64;

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum InlineButtons {
    Settings(SettingsButton),
    WebRegenerate,
}

impl InlineButtons {
    /// Label for buttons with fixed text. Menu entries with prices are labeled
    /// by the settings renderer.
    #[must_use]
    pub fn label(&self, locale: &str) -> Cow<'_, str> {
        match self {
            Self::WebRegenerate => t!("web.buttons.regenerate", locale = locale),
            Self::Settings(button) => match button {
                SettingsButton::Open => t!("settings.buttons.back", locale = locale),
                SettingsButton::NickChange => t!("settings.buttons.nickname-free", locale = locale),
                SettingsButton::IdChange => t!("settings.buttons.bot-id-free", locale = locale),
                SettingsButton::ExternalServices => {
                    t!("settings.buttons.external-services", locale = locale)
                },
                SettingsButton::DeleteAccount => {
                    t!("settings.buttons.delete-account", locale = locale)
                },
                SettingsButton::StartRecovery => t!("settings.buttons.recovery", locale = locale),
                SettingsButton::Back => t!("settings.buttons.back", locale = locale),
                SettingsButton::Close => t!("settings.buttons.close", locale = locale),
                SettingsButton::Pay(_, kind) => Cow::Borrowed(kind.symbol()),
                SettingsButton::GenerateId => t!("settings.buttons.generate-id", locale = locale),
                SettingsButton::DeleteConfirm => {
                    t!("settings.buttons.delete-confirm", locale = locale)
                },
                SettingsButton::DeleteFinalConfirm => {
                    t!("settings.buttons.delete-final-confirm", locale = locale)
                },
                SettingsButton::RecoveryConfirm => {
                    t!("settings.buttons.recovery-confirm", locale = locale)
                },
                SettingsButton::RecoveryCancel => {
                    t!("settings.buttons.recovery-cancel", locale = locale)
                },
            },
        }
    }

    #[must_use]
    pub fn into_inline_keyboard_button(self, locale: &str) -> InlineKeyboardButton {
        let label = self.label(locale).into_owned();

        self.with_label(label)
    }

    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::new(label, self.into())
    }
}

impl From<SettingsButton> for InlineButtons {
    fn from(button: SettingsButton) -> Self {
        Self::Settings(button)
    }
}

#[allow(clippy::from_over_into)]
impl Into<InlineKeyboardButtonKind> for InlineButtons {
    fn into(self) -> InlineKeyboardButtonKind {
        InlineKeyboardButtonKind::CallbackData(self.to_string())
    }
}

impl FromStr for InlineButtons {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl Display for InlineButtons {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            serde_json::to_string(self)
                .map_err(|_| std::fmt::Error)?
                .as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{CurrencyKind, PaidAction};

    fn all_buttons() -> Vec<InlineButtons> {
        let mut buttons = vec![InlineButtons::WebRegenerate];

        buttons.extend(
            [
                SettingsButton::Open,
                SettingsButton::NickChange,
                SettingsButton::IdChange,
                SettingsButton::ExternalServices,
                SettingsButton::DeleteAccount,
                SettingsButton::StartRecovery,
                SettingsButton::Back,
                SettingsButton::Close,
                SettingsButton::Pay(PaidAction::Nickname, CurrencyKind::Crystals),
                SettingsButton::Pay(PaidAction::BotId, CurrencyKind::Tokens),
                SettingsButton::GenerateId,
                SettingsButton::DeleteConfirm,
                SettingsButton::DeleteFinalConfirm,
                SettingsButton::RecoveryConfirm,
                SettingsButton::RecoveryCancel,
            ]
            .map(InlineButtons::from),
        );

        buttons
    }

    #[test]
    fn callback_data_fits_telegram_limit() {
        for button in all_buttons() {
            let data = button.to_string();

            assert!(data.len() <= CALLBACK_DATA_MAX_LEN, "{data} is too long");
        }
    }

    #[test]
    fn callback_data_parses_back() {
        for button in all_buttons() {
            assert_eq!(button.to_string().parse::<InlineButtons>().ok(), Some(button));
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("nick_change".parse::<InlineButtons>().is_err());
        assert!(r#"{"Settings":"Explode"}"#.parse::<InlineButtons>().is_err());
    }

    #[test]
    fn labels_are_translated() {
        let button = InlineButtons::Settings(SettingsButton::Close);

        assert_ne!(button.label("en"), button.label("ru"));
    }
}
