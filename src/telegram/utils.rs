use teloxide::types::{Chat, User};

use crate::settings::{Actor, ChatKind};

pub const DEFAULT_LOCALE: &str = "ru";

/// Everything but English speakers gets Russian
pub fn locale(user: Option<&User>) -> &'static str {
    let code = user.and_then(|user| user.language_code.as_deref());

    match code {
        Some(code) if code.starts_with("en") => "en",
        _ => DEFAULT_LOCALE,
    }
}

pub fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Shared
    }
}

pub fn actor(chat: &Chat, user: &User) -> anyhow::Result<Actor> {
    Ok(Actor {
        user_id: i64::try_from(user.id.0)?,
        chat_id: chat.id.0,
        chat_kind: chat_kind(chat),
    })
}

/// Commands never count as conversation input, even those for other bots
pub fn looks_like_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

/// Telegram display name used as default nickname
pub fn display_name(user: &User) -> String {
    let name = format!(
        "{} {}",
        user.first_name,
        user.last_name.as_deref().unwrap_or_default()
    );

    let name = name.trim();

    if name.is_empty() {
        return user.id.to_string();
    }

    name.to_owned()
}

#[cfg(test)]
mod tests {
    use teloxide::types::UserId;

    use super::*;

    fn user(language_code: Option<&str>) -> User {
        User {
            id: UserId(42),
            is_bot: false,
            first_name: "Neo".into(),
            last_name: None,
            username: None,
            language_code: language_code.map(ToOwned::to_owned),
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn english_speakers_get_english() {
        assert_eq!(locale(Some(&user(Some("en")))), "en");
        assert_eq!(locale(Some(&user(Some("en-GB")))), "en");
    }

    #[test]
    fn everyone_else_gets_russian() {
        assert_eq!(locale(Some(&user(Some("ru")))), "ru");
        assert_eq!(locale(Some(&user(Some("uk")))), "ru");
        assert_eq!(locale(Some(&user(None))), "ru");
        assert_eq!(locale(None), "ru");
    }

    #[test]
    fn commands_are_not_input() {
        assert!(looks_like_command("/settings@OtherBot"));
        assert!(looks_like_command(" /cancel"));
        assert!(looks_like_command("/"));
        assert!(!looks_like_command("NEO1"));
        assert!(!looks_like_command("neo/trinity"));
    }

    #[test]
    fn display_name_is_trimmed() {
        assert_eq!(display_name(&user(None)), "Neo");

        let full = User {
            last_name: Some("Anderson".into()),
            ..user(None)
        };
        assert_eq!(display_name(&full), "Neo Anderson");
    }
}
