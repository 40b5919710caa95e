use async_trait::async_trait;
use teloxide::dispatching::dialogue::Dialogue;
use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, User};
use teloxide::utils::html;

use super::recovery::TelegramRecovery;
use crate::app::{App, SettingsStorage};
use crate::entity::prelude::*;
use crate::services::{CurrencyService, UserService};
use crate::settings::backend::{
    BotIdChange,
    CurrencyLedger,
    IdRejection,
    RecoveryOutcome,
    UserRegistry,
};
use crate::settings::{
    Action,
    Balances,
    CurrencyKind,
    MenuOptions,
    Offer,
    Operation,
    PaidAction,
    Price,
    Reply,
    SettingsButton,
    SettingsConfig,
    SettingsController,
    SettingsSession,
    Transition,
};
use crate::telegram::commands::UserCommandDisplay;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::utils;
use crate::utils::teloxide::{CallbackQueryExt as _, ResultExt as _};

pub type SettingsDialogue = Dialogue<SettingsSession, SettingsStorage>;

/// User registry and currency ledger on top of the database
pub struct DbBackend {
    app: &'static App,
}

impl DbBackend {
    pub fn new(app: &'static App) -> Self {
        Self { app }
    }
}

#[async_trait]
impl UserRegistry for DbBackend {
    async fn find(&self, user_id: i64) -> anyhow::Result<Option<UserModel>> {
        UserService::find(self.app.db(), user_id).await
    }

    async fn set_nickname(&self, user_id: i64, nickname: &str) -> anyhow::Result<bool> {
        UserService::set_nickname(self.app.db(), user_id, nickname).await
    }

    async fn set_bot_id(&self, user_id: i64, bot_id: &str) -> anyhow::Result<BotIdChange> {
        UserService::set_bot_id(self.app.db(), user_id, bot_id).await
    }

    async fn regenerate_bot_id(&self, user_id: i64) -> anyhow::Result<Option<String>> {
        UserService::regenerate_bot_id(self.app.db(), user_id).await
    }

    async fn delete_account(&self, user_id: i64) -> anyhow::Result<bool> {
        UserService::delete_account(self.app.db(), user_id).await
    }
}

#[async_trait]
impl CurrencyLedger for DbBackend {
    async fn balances(&self, user_id: i64) -> anyhow::Result<Balances> {
        CurrencyService::balances(self.app.db(), user_id).await
    }

    async fn subtract(
        &self,
        user_id: i64,
        kind: CurrencyKind,
        amount: i64,
    ) -> anyhow::Result<bool> {
        CurrencyService::subtract(self.app.db(), user_id, kind, amount).await
    }
}

/// Loads the chat session, runs the controller and stores the outcome
async fn drive(
    app: &'static App,
    chat: &Chat,
    user: &User,
    action: Action,
) -> anyhow::Result<Transition> {
    let dialogue = SettingsDialogue::new(app.settings_storage(), chat.id);
    let session = dialogue.get().await?;
    let had_session = session.is_some();

    let actor = utils::actor(chat, user)?;
    let backend = DbBackend::new(app);
    let recovery = TelegramRecovery::new(app, utils::locale(Some(user)));

    let transition = SettingsController::new(app.settings_config(), &backend, &backend, &recovery)
        .handle(session, &actor, action)
        .await;

    match &transition.session {
        Some(session) => dialogue.update(session.clone()).await?,
        None if had_session => dialogue.exit().await?,
        None => {},
    }

    Ok(transition)
}

#[derive(Debug)]
enum Screen {
    Page {
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Notice {
        text: String,
        alert: bool,
    },
    Remove,
    Nothing,
}

impl Screen {
    fn page(text: impl Into<String>) -> Self {
        Self::Page {
            text: text.into(),
            keyboard: None,
        }
    }

    fn with_keyboard(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self::Page {
            text: text.into(),
            keyboard: Some(InlineKeyboardMarkup::new(rows)),
        }
    }
}

fn button(button: SettingsButton, locale: &str) -> InlineKeyboardButton {
    InlineButtons::Settings(button).into_inline_keyboard_button(locale)
}

fn price_text(price: &Price, kinds: &[CurrencyKind]) -> String {
    kinds
        .iter()
        .map(|kind| format!("{}{}", price.amount(*kind), kind.symbol()))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn offer_button(
    config: &SettingsConfig,
    action: PaidAction,
    offer: &Offer,
    locale: &str,
) -> InlineKeyboardButton {
    let (free_key, paid_key, settings_button) = match action {
        PaidAction::Nickname => (
            "settings.buttons.nickname-free",
            "settings.buttons.nickname-paid",
            SettingsButton::NickChange,
        ),
        PaidAction::BotId => (
            "settings.buttons.bot-id-free",
            "settings.buttons.bot-id-paid",
            SettingsButton::IdChange,
        ),
    };

    let label = match offer {
        Offer::Free => t!(free_key, locale = locale),
        Offer::Paid(kinds) => t!(
            paid_key,
            locale = locale,
            price = price_text(config.price(action), kinds)
        ),
    };

    InlineButtons::Settings(settings_button).with_label(label)
}

fn main_menu(config: &SettingsConfig, options: &MenuOptions, locale: &str) -> Screen {
    let mut rows = vec![];

    if let Some(offer) = &options.nickname {
        rows.push(vec![offer_button(config, PaidAction::Nickname, offer, locale)]);
    }

    if let Some(offer) = &options.bot_id {
        rows.push(vec![offer_button(config, PaidAction::BotId, offer, locale)]);
    }

    if options.recovery {
        rows.push(vec![button(SettingsButton::StartRecovery, locale)]);
    }

    rows.push(vec![button(SettingsButton::ExternalServices, locale)]);
    rows.push(vec![button(SettingsButton::DeleteAccount, locale)]);
    rows.push(vec![button(SettingsButton::Close, locale)]);

    Screen::with_keyboard(t!("settings.main-menu", locale = locale), rows)
}

fn payment_choice(
    action: PaidAction,
    price: &Price,
    affordable: &[CurrencyKind],
    locale: &str,
) -> Screen {
    let pay_buttons = affordable
        .iter()
        .map(|kind| {
            let label = t!(
                "settings.buttons.pay",
                locale = locale,
                amount = price.amount(*kind),
                symbol = kind.symbol()
            );

            InlineButtons::Settings(SettingsButton::Pay(action, *kind)).with_label(label)
        })
        .collect();

    let text = match action {
        PaidAction::Nickname => t!("settings.payment-nickname", locale = locale),
        PaidAction::BotId => t!("settings.payment-bot-id", locale = locale),
    };

    Screen::with_keyboard(
        text,
        vec![pay_buttons, vec![button(SettingsButton::Back, locale)]],
    )
}

fn render(config: &SettingsConfig, reply: &Reply, locale: &str) -> Screen {
    let max = config.max_nickname_len;
    let close = || vec![vec![button(SettingsButton::Close, locale)]];
    let back = || vec![vec![button(SettingsButton::Back, locale)]];

    match reply {
        Reply::MainMenu(options) => main_menu(config, options, locale),
        Reply::ExternalServices => {
            Screen::with_keyboard(t!("settings.external-services", locale = locale), back())
        },
        Reply::NotRegistered => Screen::page(t!(
            "common.not-registered",
            locale = locale,
            start = UserCommandDisplay::Start
        )),
        Reply::NotInitiator => Screen::Notice {
            text: t!("settings.not-initiator", locale = locale).into_owned(),
            alert: true,
        },
        Reply::Stale => Screen::Notice {
            text: t!("settings.stale", locale = locale).into_owned(),
            alert: false,
        },
        Reply::Ignored => Screen::Nothing,
        Reply::PaymentChoice {
            action,
            price,
            affordable,
        } => payment_choice(*action, price, affordable, locale),
        Reply::InsufficientFunds => Screen::with_keyboard(
            t!("settings.insufficient-funds", locale = locale),
            vec![vec![button(SettingsButton::Open, locale)]],
        ),
        Reply::NicknamePrompt { paid: false } => Screen::with_keyboard(
            t!("settings.nickname-prompt", locale = locale, max = max),
            close(),
        ),
        // Paid input has no way out but submitting it
        Reply::NicknamePrompt { paid: true } => Screen::page(t!(
            "settings.nickname-prompt-paid",
            locale = locale,
            max = max
        )),
        Reply::NicknameInvalid => {
            Screen::page(t!("settings.nickname-invalid", locale = locale, max = max))
        },
        Reply::NicknameChanged(nickname) => Screen::page(t!(
            "settings.nickname-changed",
            locale = locale,
            nickname = html::escape(nickname)
        )),
        Reply::BotIdPrompt { paid: false } => Screen::with_keyboard(
            t!("settings.bot-id-prompt", locale = locale),
            vec![
                vec![button(SettingsButton::GenerateId, locale)],
                vec![button(SettingsButton::Close, locale)],
            ],
        ),
        Reply::BotIdPrompt { paid: true } => Screen::with_keyboard(
            t!("settings.bot-id-prompt-paid", locale = locale),
            vec![vec![button(SettingsButton::GenerateId, locale)]],
        ),
        Reply::BotIdRejected(IdRejection::Malformed) => {
            Screen::page(t!("settings.bot-id-malformed", locale = locale))
        },
        Reply::BotIdRejected(IdRejection::Taken) => {
            Screen::page(t!("settings.bot-id-taken", locale = locale))
        },
        Reply::BotIdChanged(bot_id) => Screen::page(t!(
            "settings.bot-id-changed",
            locale = locale,
            bot_id = html::escape(bot_id)
        )),
        Reply::DeleteWarning => Screen::with_keyboard(
            t!("settings.delete-warning", locale = locale),
            vec![
                vec![button(SettingsButton::DeleteConfirm, locale)],
                vec![button(SettingsButton::Back, locale)],
            ],
        ),
        Reply::DeleteFinalWarning => Screen::with_keyboard(
            t!("settings.delete-final-warning", locale = locale),
            vec![
                vec![button(SettingsButton::DeleteFinalConfirm, locale)],
                vec![button(SettingsButton::Back, locale)],
            ],
        ),
        Reply::CaptchaPrompt(word) => Screen::with_keyboard(
            t!("settings.captcha-prompt", locale = locale, word = word),
            close(),
        ),
        Reply::CaptchaWrong { remaining } => Screen::page(t!(
            "settings.captcha-wrong",
            locale = locale,
            remaining = remaining
        )),
        Reply::CaptchaExhausted => Screen::page(t!("settings.captcha-exhausted", locale = locale)),
        Reply::AccountDeleted => Screen::page(t!("settings.account-deleted", locale = locale)),
        Reply::RecoveryStarted => Screen::page(t!("settings.recovery-started", locale = locale)),
        Reply::RecoveryConfirmed(RecoveryOutcome::Restored { crystals, tokens }) => {
            Screen::page(t!(
                "settings.recovery-restored",
                locale = locale,
                crystals = crystals,
                tokens = tokens
            ))
        },
        Reply::RecoveryConfirmed(RecoveryOutcome::NothingFound) => {
            Screen::page(t!("settings.recovery-nothing", locale = locale))
        },
        Reply::RecoveryConfirmed(RecoveryOutcome::AlreadyRecovered) => {
            Screen::page(t!("settings.recovery-already", locale = locale))
        },
        Reply::RecoveryCancelled => {
            Screen::page(t!("settings.recovery-cancelled", locale = locale))
        },
        Reply::Closed => Screen::Remove,
        Reply::Cancelled => Screen::page(t!("settings.cancelled", locale = locale)),
        Reply::Failed(operation) => {
            let text = match operation {
                Operation::Nickname => t!("settings.nickname-failed", locale = locale),
                Operation::BotId => t!("settings.bot-id-failed", locale = locale),
                Operation::Deletion => t!("settings.delete-failed", locale = locale),
                Operation::Settings | Operation::Recovery => {
                    t!("common.error", locale = locale)
                },
            };

            Screen::page(text)
        },
    }
}

/// Answers a command or typed text with a new message
async fn reply_to(app: &'static App, m: &Message, screen: Screen) -> anyhow::Result<HandleStatus> {
    match screen {
        Screen::Page { text, keyboard } => {
            let request = app
                .bot()
                .send_message(m.chat.id, text)
                .parse_mode(ParseMode::Html);

            match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await?,
                None => request.await?,
            };

            Ok(HandleStatus::Handled)
        },
        // Commands have no private notices, the chat sees it
        Screen::Notice { text, .. } => {
            app.bot().send_message(m.chat.id, text).await?;

            Ok(HandleStatus::Handled)
        },
        Screen::Remove => Ok(HandleStatus::Handled),
        Screen::Nothing => Ok(HandleStatus::Skipped),
    }
}

#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle_open(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(user) = m.from.as_ref() else {
        return Ok(HandleStatus::Skipped);
    };

    let transition = drive(app, &m.chat, user, Action::Open).await?;
    let screen = render(app.settings_config(), &transition.reply, utils::locale(Some(user)));

    reply_to(app, m, screen).await
}

#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle_cancel(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let Some(user) = m.from.as_ref() else {
        return Ok(HandleStatus::Skipped);
    };

    let transition = drive(app, &m.chat, user, Action::Cancel).await?;
    let screen = render(app.settings_config(), &transition.reply, utils::locale(Some(user)));

    reply_to(app, m, screen).await
}

/// Typed input for the settings conversation of this chat, if there is one
#[tracing::instrument(skip_all, fields(chat_id = %m.chat.id))]
pub async fn handle_text(app: &'static App, m: &Message) -> anyhow::Result<HandleStatus> {
    let (Some(user), Some(text)) = (m.from.as_ref(), m.text()) else {
        return Ok(HandleStatus::Skipped);
    };

    if utils::looks_like_command(text) {
        return Ok(HandleStatus::Skipped);
    }

    let dialogue = SettingsDialogue::new(app.settings_storage(), m.chat.id);
    if dialogue.get().await?.is_none() {
        return Ok(HandleStatus::Skipped);
    }

    let transition = drive(app, &m.chat, user, Action::Text(text.to_owned())).await?;

    if transition.reply == Reply::NotInitiator {
        return Ok(HandleStatus::Skipped);
    }

    let screen = render(app.settings_config(), &transition.reply, utils::locale(Some(user)));

    reply_to(app, m, screen).await
}

#[tracing::instrument(skip_all, fields(user_id = %q.from.id, ?button))]
pub async fn handle_inline(
    app: &'static App,
    q: CallbackQuery,
    button: SettingsButton,
) -> anyhow::Result<()> {
    let locale = utils::locale(Some(&q.from));

    let Some(message) = q.get_message() else {
        app.bot()
            .answer_callback_query(q.id.clone())
            .text(t!("common.broken-button", locale = locale))
            .await?;

        return Ok(());
    };

    let transition = drive(app, &message.chat, &q.from, Action::Button(button)).await?;

    match render(app.settings_config(), &transition.reply, locale) {
        Screen::Notice { text, alert } => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text(text)
                .show_alert(alert)
                .await?;
        },
        Screen::Page { text, keyboard } => {
            app.bot().answer_callback_query(q.id.clone()).await?;

            let request = app.bot().edit_text(&message, text).parse_mode(ParseMode::Html);

            let res = match keyboard {
                Some(keyboard) => request.reply_markup(keyboard).await,
                None => request.await,
            };

            if let Err(err) = res.ignore_not_modified() {
                tracing::warn!(err = ?err, "Failed to render settings");
            }
        },
        Screen::Remove => {
            app.bot().answer_callback_query(q.id.clone()).await?;

            if let Err(err) = app.bot().delete(&message).await {
                tracing::warn!(err = ?err, "Failed to delete settings message");
            }
        },
        Screen::Nothing => {
            app.bot().answer_callback_query(q.id.clone()).await?;
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SettingsConfig {
        SettingsConfig::default()
    }

    fn callbacks(screen: &Screen) -> Vec<InlineButtons> {
        let Screen::Page {
            keyboard: Some(keyboard),
            ..
        } = screen
        else {
            return vec![];
        };

        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => data.parse().ok(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn main_menu_lists_only_offered_actions() {
        let screen = render(
            &config(),
            &Reply::MainMenu(MenuOptions {
                nickname: Some(Offer::Paid(vec![CurrencyKind::Crystals])),
                bot_id: None,
                recovery: false,
            }),
            "en",
        );

        assert_eq!(
            callbacks(&screen),
            vec![
                InlineButtons::from(SettingsButton::NickChange),
                InlineButtons::from(SettingsButton::ExternalServices),
                InlineButtons::from(SettingsButton::DeleteAccount),
                InlineButtons::from(SettingsButton::Close),
            ]
        );
    }

    #[test]
    fn main_menu_shows_recovery() {
        let screen = render(
            &config(),
            &Reply::MainMenu(MenuOptions {
                nickname: Some(Offer::Free),
                bot_id: Some(Offer::Free),
                recovery: true,
            }),
            "ru",
        );

        assert!(callbacks(&screen).contains(&InlineButtons::from(SettingsButton::StartRecovery)));
    }

    #[test]
    fn payment_offers_affordable_currencies() {
        let screen = render(
            &config(),
            &Reply::PaymentChoice {
                action: PaidAction::Nickname,
                price: config().nickname_price,
                affordable: vec![CurrencyKind::Crystals],
            },
            "en",
        );

        assert_eq!(
            callbacks(&screen),
            vec![
                InlineButtons::from(SettingsButton::Pay(
                    PaidAction::Nickname,
                    CurrencyKind::Crystals
                )),
                InlineButtons::from(SettingsButton::Back),
            ]
        );
    }

    #[test]
    fn price_lists_every_currency() {
        assert_eq!(
            price_text(
                &Price::new(1000, 100),
                &[CurrencyKind::Crystals, CurrencyKind::Tokens]
            ),
            "1000💎 / 100🪙"
        );
    }

    #[test]
    fn nickname_is_escaped() {
        let Screen::Page { text, .. } = render(
            &config(),
            &Reply::NicknameChanged("<b>neo</b>".into()),
            "en",
        ) else {
            panic!("nickname change should be a page");
        };

        assert!(text.contains("&lt;b&gt;neo&lt;/b&gt;"));
    }

    #[test]
    fn foreign_presses_are_private_notices() {
        assert!(matches!(
            render(&config(), &Reply::NotInitiator, "en"),
            Screen::Notice { alert: true, .. }
        ));
        assert!(matches!(
            render(&config(), &Reply::Stale, "en"),
            Screen::Notice { alert: false, .. }
        ));
    }

    #[test]
    fn paid_prompts_offer_no_way_out() {
        let nickname = render(&config(), &Reply::NicknamePrompt { paid: true }, "en");
        assert!(callbacks(&nickname).is_empty());

        let bot_id = render(&config(), &Reply::BotIdPrompt { paid: true }, "en");
        assert_eq!(
            callbacks(&bot_id),
            vec![InlineButtons::from(SettingsButton::GenerateId)]
        );

        let free = render(&config(), &Reply::BotIdPrompt { paid: false }, "en");
        assert!(callbacks(&free).contains(&InlineButtons::from(SettingsButton::Close)));
    }

    #[test]
    fn close_removes_menu() {
        assert!(matches!(
            render(&config(), &Reply::Closed, "en"),
            Screen::Remove
        ));
    }
}
