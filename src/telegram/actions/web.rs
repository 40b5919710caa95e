use chrono::Local;
use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, User};
use teloxide::utils::html;

use crate::app::App;
use crate::services::web_code::expires_text;
use crate::services::{UserService, WebCodeError, WebCodeRequest, WebCodeResponse};
use crate::telegram::commands::UserCommandDisplay;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::utils;
use crate::utils::teloxide::{CallbackQueryExt as _, ResultExt as _};
use crate::utils::StringUtils as _;

/// Rejection bodies can be whole HTML pages
const REJECTION_DETAILS_MAX_LEN: usize = 500;

struct CodeScreen {
    text: String,
    keyboard: Option<InlineKeyboardMarkup>,
}

fn code_text(response: &WebCodeResponse, locale: &str) -> String {
    let fallback = t!("web.expires-fallback", locale = locale);
    let expires = expires_text(response.expires_at.as_deref(), &Local, &fallback);

    t!(
        "web.code",
        locale = locale,
        code = html::escape(&response.code),
        expires = html::escape(&expires)
    )
    .into_owned()
}

fn error_text(err: &WebCodeError, locale: &str) -> String {
    match err {
        WebCodeError::Rejected { status, body } => t!(
            "web.rejected",
            locale = locale,
            status = status,
            details = html::escape(&body.chars_crop(REJECTION_DETAILS_MAX_LEN))
        ),
        WebCodeError::InvalidResponse(_) => t!("web.invalid-response", locale = locale),
        WebCodeError::ConnectionFailed => t!("web.connection-failed", locale = locale),
    }
    .into_owned()
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
async fn issue_code(app: &'static App, user: &User, locale: &str) -> anyhow::Result<CodeScreen> {
    let Some(web_code) = app.web_code() else {
        return Ok(CodeScreen {
            text: t!("web.unavailable", locale = locale).into_owned(),
            keyboard: None,
        });
    };

    let Some(account) = UserService::find(app.db(), i64::try_from(user.id.0)?).await? else {
        return Ok(CodeScreen {
            text: t!(
                "common.not-registered",
                locale = locale,
                start = UserCommandDisplay::Start
            )
            .into_owned(),
            keyboard: None,
        });
    };

    let text = match web_code.request_code(&WebCodeRequest::from(&account)).await {
        Ok(response) => {
            tracing::info!("Web code issued");

            code_text(&response, locale)
        },
        Err(err) => error_text(&err, locale),
    };

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url(
            t!("web.buttons.open-site", locale = locale),
            web_code.primary_mirror().clone(),
        )],
        vec![InlineButtons::WebRegenerate.into_inline_keyboard_button(locale)],
    ]);

    Ok(CodeScreen {
        text,
        keyboard: Some(keyboard),
    })
}

pub async fn handle_command(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(user) = m.from.as_ref() else {
        return Ok(HandleStatus::Skipped);
    };

    let locale = utils::locale(Some(user));

    if !m.chat.is_private() {
        app.bot()
            .send_message(m.chat.id, t!("web.private-only", locale = locale))
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let screen = issue_code(app, user, locale).await?;

    let request = app
        .bot()
        .send_message(m.chat.id, screen.text)
        .parse_mode(ParseMode::Html);

    match screen.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await?,
        None => request.await?,
    };

    Ok(HandleStatus::Handled)
}

pub async fn handle_inline_regenerate(app: &'static App, q: CallbackQuery) -> anyhow::Result<()> {
    let locale = utils::locale(Some(&q.from));

    let Some(message) = q.get_message() else {
        app.bot()
            .answer_callback_query(q.id.clone())
            .text(t!("common.broken-button", locale = locale))
            .await?;

        return Ok(());
    };

    if !message.chat.is_private() {
        app.bot()
            .answer_callback_query(q.id.clone())
            .text(t!("web.private-only", locale = locale))
            .await?;

        return Ok(());
    }

    app.bot().answer_callback_query(q.id.clone()).await?;

    let screen = issue_code(app, &q.from, locale).await?;

    let request = app
        .bot()
        .edit_text(&message, screen.text)
        .parse_mode(ParseMode::Html);

    match screen.keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await,
        None => request.await,
    }
    .ignore_not_modified()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_shown_with_fallback_expiry() {
        let text = code_text(
            &WebCodeResponse {
                code: "123456".into(),
                expires_at: None,
            },
            "en",
        );

        assert!(text.contains("<code>123456</code>"));
        assert!(text.contains("10 minutes"));
    }

    #[test]
    fn rejection_details_are_escaped() {
        let text = error_text(
            &WebCodeError::Rejected {
                status: 500,
                body: "<html>oops</html>".into(),
            },
            "en",
        );

        assert!(text.contains("500"));
        assert!(text.contains("&lt;html&gt;oops&lt;/html&gt;"));
    }

    #[test]
    fn every_failure_has_text() {
        for err in [
            WebCodeError::InvalidResponse("eof".into()),
            WebCodeError::ConnectionFailed,
        ] {
            assert!(!error_text(&err, "ru").is_empty());
        }
    }
}
