use rand::Rng as _;
use serde::{Deserialize, Serialize};

pub const CAPTCHA_LEN: usize = 5;
const CAPTCHA_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsState {
    #[default]
    MainMenu,
    ConfirmNickChange,
    AwaitingNickname,
    ConfirmIdChange,
    AwaitingId,
    ConfirmDelete,
    FinalConfirmDelete,
    AwaitingCaptcha,
    ConfirmingRecovery,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Captcha {
    word: String,
    attempts: u8,
}

impl Captcha {
    pub fn generate() -> Self {
        let mut rng = rand::rng();

        let word = (0..CAPTCHA_LEN)
            .map(|_| CAPTCHA_CHARSET[rng.random_range(0..CAPTCHA_CHARSET.len())] as char)
            .collect();

        Self { word, attempts: 0 }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    /// Wrong guesses so far
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn matches(&self, input: &str) -> bool {
        input.trim().to_uppercase() == self.word
    }

    pub fn fail(&mut self) -> u8 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Shared,
}

/// Who is pressing the button or typing, and where
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
}

/// Per-chat settings conversation. Absence of a session means the
/// conversation is closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSession {
    initiator_id: i64,
    state: SettingsState,
    captcha: Option<Captcha>,
    /// Input was paid for and is still owed to the user
    #[serde(default)]
    prepaid: bool,
}

impl SettingsSession {
    pub fn new(initiator_id: i64) -> Self {
        Self {
            initiator_id,
            state: SettingsState::MainMenu,
            captcha: None,
            prepaid: false,
        }
    }

    pub fn initiator_id(&self) -> i64 {
        self.initiator_id
    }

    pub fn state(&self) -> SettingsState {
        self.state
    }

    pub fn captcha(&self) -> Option<&Captcha> {
        self.captcha.as_ref()
    }

    pub fn is_prepaid(&self) -> bool {
        self.prepaid
    }

    /// Private chats belong to their only user
    pub fn authorizes(&self, actor: &Actor) -> bool {
        match actor.chat_kind {
            ChatKind::Private => true,
            ChatKind::Shared => actor.user_id == self.initiator_id,
        }
    }

    /// Moves to another state, captcha and payment never survive a state change
    #[must_use]
    pub fn into_state(self, state: SettingsState) -> Self {
        Self {
            state,
            captcha: None,
            prepaid: false,
            ..self
        }
    }

    /// Input state entered right after a successful debit
    #[must_use]
    pub fn into_prepaid(self, state: SettingsState) -> Self {
        Self {
            prepaid: true,
            ..self.into_state(state)
        }
    }

    #[must_use]
    pub fn into_captcha(self, captcha: Captcha) -> Self {
        Self {
            state: SettingsState::AwaitingCaptcha,
            captcha: Some(captcha),
            prepaid: false,
            ..self
        }
    }

    pub(super) fn take_captcha(&mut self) -> Option<Captcha> {
        self.captcha.take()
    }

    pub(super) fn put_captcha(&mut self, captcha: Captcha) {
        self.captcha = Some(captcha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captcha_has_five_upper_alphanumerics() {
        for _ in 0..100 {
            let captcha = Captcha::generate();

            assert_eq!(captcha.word().len(), CAPTCHA_LEN);
            assert!(captcha
                .word()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            assert_eq!(captcha.attempts(), 0);
        }
    }

    #[test]
    fn captcha_is_case_insensitive() {
        let captcha = Captcha {
            word: "AB3XZ".into(),
            attempts: 0,
        };

        assert!(captcha.matches("ab3xz"));
        assert!(captcha.matches("  Ab3Xz\n"));
        assert!(!captcha.matches("AB3X"));
    }

    #[test]
    fn shared_chat_only_trusts_initiator() {
        let session = SettingsSession::new(10);

        let initiator = Actor {
            user_id: 10,
            chat_id: -100,
            chat_kind: ChatKind::Shared,
        };
        let stranger = Actor {
            user_id: 11,
            ..initiator
        };

        assert!(session.authorizes(&initiator));
        assert!(!session.authorizes(&stranger));
    }

    #[test]
    fn private_chat_trusts_everyone() {
        let session = SettingsSession::new(10);

        assert!(session.authorizes(&Actor {
            user_id: 99,
            chat_id: 99,
            chat_kind: ChatKind::Private,
        }));
    }

    #[test]
    fn state_change_drops_captcha() {
        let session = SettingsSession::new(1)
            .into_captcha(Captcha::generate())
            .into_state(SettingsState::MainMenu);

        assert_eq!(session.captcha(), None);
        assert_eq!(session.state(), SettingsState::MainMenu);
    }

    #[test]
    fn payment_mark_lives_only_in_its_input_state() {
        let session = SettingsSession::new(1).into_prepaid(SettingsState::AwaitingId);

        assert!(session.is_prepaid());
        assert_eq!(session.state(), SettingsState::AwaitingId);
        assert!(!session.into_state(SettingsState::MainMenu).is_prepaid());
    }

    #[test]
    fn sessions_stored_before_payment_mark_still_load() {
        let session: SettingsSession =
            serde_json::from_str(r#"{"initiator_id":5,"state":"AwaitingId","captcha":null}"#)
                .unwrap();

        assert!(!session.is_prepaid());
        assert_eq!(session.state(), SettingsState::AwaitingId);
    }
}
