use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::html;

use crate::app::App;
use crate::services::UserService;
use crate::telegram::commands::UserCommandDisplay;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::utils;

/// Registers the sender on the first /start
#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(user) = m.from.as_ref() else {
        return Ok(HandleStatus::Skipped);
    };

    let locale = utils::locale(Some(user));

    let (account, created) = UserService::register(
        app.db(),
        i64::try_from(user.id.0)?,
        &utils::display_name(user),
        user.username.as_deref(),
    )
    .await?;

    let text = if created {
        t!(
            "start.registered",
            locale = locale,
            nickname = html::escape(&account.nickname),
            bot_id = &account.bot_id,
            settings = UserCommandDisplay::Settings
        )
    } else {
        t!(
            "start.welcome-back",
            locale = locale,
            nickname = html::escape(&account.nickname),
            settings = UserCommandDisplay::Settings
        )
    };

    app.bot()
        .send_message(m.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(HandleStatus::Handled)
}
