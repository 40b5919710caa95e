use commands::UserCommand;
use handlers::HandleStatus;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;

pub mod actions;
pub mod commands;
pub mod handlers;
pub mod inline_buttons;
pub mod utils;

macro_rules! return_if_handled {
    ($handle:expr) => {
        if matches!($handle, HandleStatus::Handled) {
            return Ok(HandleStatus::Handled);
        }
    };
}

pub(crate) use return_if_handled;

use crate::app::App;

#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle_message(app: &'static App, m: Message) -> anyhow::Result<HandleStatus> {
    return_if_handled!(handlers::commands::handle(app, &m).await?);
    return_if_handled!(handlers::raw_message::handle(app, &m).await?);

    // Groups are full of messages not meant for the bot
    if !m.chat.is_private() {
        return Ok(HandleStatus::Skipped);
    }

    let text = t!("common.unhandled", locale = utils::locale(m.from.as_ref()));

    app.bot()
        .send_message(
            m.chat.id,
            UserCommand::descriptions()
                .global_description(&text)
                .to_string(),
        )
        .await?;

    Ok(HandleStatus::Skipped)
}

/// Apologizes in the chat where handling failed
pub async fn report_error(app: &'static App, m: &Message) -> anyhow::Result<()> {
    app.bot()
        .send_message(
            m.chat.id,
            t!("common.error", locale = utils::locale(m.from.as_ref())),
        )
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}
