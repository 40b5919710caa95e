use anyhow::Context as _;
use teloxide::prelude::*;

use crate::app::App;
use crate::telegram::actions;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::utils;

#[tracing::instrument(skip_all, fields(user_id = %q.from.id))]
pub async fn handle(app: &'static App, q: CallbackQuery) -> anyhow::Result<()> {
    let data = q.data.as_ref().context("Callback needs data")?;

    let button: Result<InlineButtons, _> = data.parse();

    let button = match button {
        Ok(button) => button,
        Err(err) => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text(t!("common.broken-button", locale = utils::locale(Some(&q.from))))
                .await?;

            tracing::error!(err = ?err, data, "Error parsing inline button");

            return Ok(());
        },
    };

    match button {
        InlineButtons::Settings(button) => {
            actions::settings::handle_inline(app, q, button).await?;
        },
        InlineButtons::WebRegenerate => {
            actions::web::handle_inline_regenerate(app, q).await?;
        },
    }

    Ok(())
}
