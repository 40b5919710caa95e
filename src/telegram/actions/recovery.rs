use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::app::App;
use crate::services::RecoveryService;
use crate::settings::{RecoveryGateway, RecoveryOutcome, SettingsButton};
use crate::telegram::inline_buttons::InlineButtons;

/// Pause between "searching" and the found profile
const SEARCH_DELAY: Duration = Duration::from_secs(1);

pub struct TelegramRecovery {
    app: &'static App,
    locale: &'static str,
}

impl TelegramRecovery {
    pub fn new(app: &'static App, locale: &'static str) -> Self {
        Self { app, locale }
    }
}

#[async_trait]
impl RecoveryGateway for TelegramRecovery {
    async fn is_recovered(&self, user_id: i64) -> anyhow::Result<bool> {
        RecoveryService::is_recovered(self.app.db(), user_id).await
    }

    async fn schedule_search(&self, chat_id: i64, user_id: i64) -> anyhow::Result<()> {
        let app = self.app;
        let locale = self.locale;

        tokio::spawn(async move {
            tokio::time::sleep(SEARCH_DELAY).await;

            if let Err(err) = show_legacy_profile(app, ChatId(chat_id), user_id, locale).await {
                tracing::error!(err = ?err, chat_id, user_id, "Failed to show legacy profile");
            }
        });

        Ok(())
    }

    async fn confirm(&self, user_id: i64) -> anyhow::Result<RecoveryOutcome> {
        RecoveryService::complete(self.app.db(), user_id).await
    }
}

#[tracing::instrument(skip_all, fields(%chat_id, user_id))]
async fn show_legacy_profile(
    app: &'static App,
    chat_id: ChatId,
    user_id: i64,
    locale: &str,
) -> anyhow::Result<()> {
    let cancel = InlineButtons::Settings(SettingsButton::RecoveryCancel)
        .into_inline_keyboard_button(locale);

    let (text, keyboard) = match RecoveryService::find_legacy_profile(app.db(), user_id).await? {
        Some(profile) => {
            let text = t!(
                "settings.recovery-card",
                locale = locale,
                nickname = html::escape(&profile.nickname),
                crystals = profile.crystals,
                tokens = profile.tokens
            );

            let confirm = InlineButtons::Settings(SettingsButton::RecoveryConfirm)
                .into_inline_keyboard_button(locale);

            (text, InlineKeyboardMarkup::new(vec![vec![confirm], vec![cancel]]))
        },
        None => {
            tracing::info!("No legacy profile");

            (
                t!("settings.recovery-nothing", locale = locale),
                InlineKeyboardMarkup::new(vec![vec![cancel]]),
            )
        },
    };

    app.bot()
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;

    Ok(())
}
