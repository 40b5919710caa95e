use teloxide::types::Message;

use super::HandleStatus;
use crate::app::App;
use crate::telegram::{actions, utils};

#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(text) = m.text() else {
        return Ok(HandleStatus::Skipped);
    };

    if utils::looks_like_command(text) {
        return Ok(HandleStatus::Skipped);
    }

    actions::settings::handle_text(app, m).await
}
