use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::{BotCommands, ParseError};
use teloxide::utils::html;

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::telegram::commands::UserCommand;
use crate::telegram::utils;

pub async fn handle(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(text) = m.text() else {
        return Ok(HandleStatus::Skipped);
    };

    if !text.starts_with('/') {
        return Ok(HandleStatus::Skipped);
    }

    let command = match UserCommand::parse(text, app.bot_username()) {
        Err(ParseError::UnknownCommand(command)) => {
            // Commands of other bots in groups are none of our business
            if !m.chat.is_private() {
                return Ok(HandleStatus::Skipped);
            }

            app.bot()
                .send_message(
                    m.chat.id,
                    UserCommand::descriptions()
                        .global_description(&t!(
                            "common.unknown-command",
                            locale = utils::locale(m.from.as_ref()),
                            command = html::escape(&command)
                        ))
                        .to_string(),
                )
                .parse_mode(ParseMode::Html)
                .await?;

            return Ok(HandleStatus::Handled);
        },
        Err(ParseError::WrongBotName(_)) | Err(ParseError::IncorrectFormat(_)) => {
            return Ok(HandleStatus::Skipped)
        },
        Err(var) => return Err(var.into()),
        Ok(command) => command,
    };

    tracing::debug!(?command, chat_id = %m.chat.id, "Handling command");

    match command {
        UserCommand::Start => actions::start::handle(app, m).await,
        UserCommand::Help => {
            let locale = utils::locale(m.from.as_ref());

            app.bot()
                .send_message(
                    m.chat.id,
                    UserCommand::descriptions()
                        .global_description(&t!("common.help", locale = locale))
                        .to_string(),
                )
                .await?;

            Ok(HandleStatus::Handled)
        },
        UserCommand::Settings => actions::settings::handle_open(app, m).await,
        UserCommand::Cancel => actions::settings::handle_cancel(app, m).await,
        UserCommand::Web => actions::web::handle_command(app, m).await,
    }
}
