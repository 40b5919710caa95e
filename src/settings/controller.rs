use serde::{Deserialize, Serialize};

use super::backend::{
    BotIdChange,
    CurrencyLedger,
    IdRejection,
    RecoveryGateway,
    RecoveryOutcome,
    UserRegistry,
};
use super::pricing::{
    evaluate,
    recovery_visible,
    CurrencyKind,
    MenuOptions,
    PaidAction,
    Price,
    SettingsConfig,
};
use super::session::{Actor, Captcha, SettingsSession, SettingsState};
use crate::utils::StringUtils as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsButton {
    Open,
    NickChange,
    IdChange,
    ExternalServices,
    DeleteAccount,
    StartRecovery,
    Back,
    Close,
    Pay(PaidAction, CurrencyKind),
    GenerateId,
    DeleteConfirm,
    DeleteFinalConfirm,
    RecoveryConfirm,
    RecoveryCancel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Open,
    Cancel,
    Button(SettingsButton),
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Settings,
    Nickname,
    BotId,
    Deletion,
    Recovery,
}

/// What the chat layer has to show after a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    MainMenu(MenuOptions),
    ExternalServices,
    NotRegistered,
    NotInitiator,
    /// Button does not belong to the current state
    Stale,
    /// Text is not for the settings conversation
    Ignored,
    PaymentChoice {
        action: PaidAction,
        price: Price,
        affordable: Vec<CurrencyKind>,
    },
    InsufficientFunds,
    NicknamePrompt { paid: bool },
    NicknameInvalid,
    NicknameChanged(String),
    BotIdPrompt { paid: bool },
    BotIdRejected(IdRejection),
    BotIdChanged(String),
    DeleteWarning,
    DeleteFinalWarning,
    CaptchaPrompt(String),
    CaptchaWrong { remaining: u8 },
    CaptchaExhausted,
    AccountDeleted,
    RecoveryStarted,
    RecoveryConfirmed(RecoveryOutcome),
    RecoveryCancelled,
    Closed,
    Cancelled,
    Failed(Operation),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// `None` ends the conversation
    pub session: Option<SettingsSession>,
    pub reply: Reply,
}

impl Transition {
    fn keep(session: SettingsSession, reply: Reply) -> Self {
        Self {
            session: Some(session),
            reply,
        }
    }

    fn end(reply: Reply) -> Self {
        Self {
            session: None,
            reply,
        }
    }

    pub fn state(&self) -> Option<SettingsState> {
        self.session.as_ref().map(SettingsSession::state)
    }
}

pub struct SettingsController<'a, R, L, G> {
    config: &'a SettingsConfig,
    registry: &'a R,
    ledger: &'a L,
    recovery: &'a G,
}

impl<'a, R, L, G> SettingsController<'a, R, L, G>
where
    R: UserRegistry,
    L: CurrencyLedger,
    G: RecoveryGateway,
{
    pub fn new(
        config: &'a SettingsConfig,
        registry: &'a R,
        ledger: &'a L,
        recovery: &'a G,
    ) -> Self {
        Self {
            config,
            registry,
            ledger,
            recovery,
        }
    }

    /// Computes the next session and reply. Never fails: service errors end
    /// the conversation with a generic failure.
    #[tracing::instrument(
        skip_all,
        fields(
            user_id = actor.user_id,
            chat_id = actor.chat_id,
            state = ?session.as_ref().map(SettingsSession::state),
        )
    )]
    pub async fn handle(
        &self,
        session: Option<SettingsSession>,
        actor: &Actor,
        action: Action,
    ) -> Transition {
        match self.dispatch(session, actor, action).await {
            Ok(transition) => transition,
            Err(err) => {
                tracing::error!(err = ?err, "Settings transition failed");

                Transition::end(Reply::Failed(Operation::Settings))
            },
        }
    }

    async fn dispatch(
        &self,
        session: Option<SettingsSession>,
        actor: &Actor,
        action: Action,
    ) -> anyhow::Result<Transition> {
        let session = match (session, &action) {
            (None, Action::Open | Action::Button(SettingsButton::Open)) => {
                return self.open(actor).await;
            },
            (None, Action::Cancel) => return Ok(Transition::end(Reply::Cancelled)),
            (None, Action::Button(_)) => return Ok(Transition::end(Reply::Stale)),
            (None, Action::Text(_)) => return Ok(Transition::end(Reply::Ignored)),
            (Some(session), _) => session,
        };

        if !session.authorizes(actor) {
            tracing::debug!(
                initiator_id = session.initiator_id(),
                "Non-initiator tried to drive settings"
            );

            return Ok(Transition::keep(session, Reply::NotInitiator));
        }

        if session.is_prepaid() && Self::abandons(&action) {
            tracing::info!(state = ?session.state(), "Paid input is still owed");

            return Ok(Self::prompt(session));
        }

        match action {
            Action::Open => self.open(actor).await,
            Action::Cancel => Ok(Transition::end(Reply::Cancelled)),
            Action::Button(button) => self.on_button(session, actor, button).await,
            Action::Text(text) => self.on_text(session, actor, &text).await,
        }
    }

    async fn open(&self, actor: &Actor) -> anyhow::Result<Transition> {
        let session = SettingsSession::new(actor.user_id);

        self.main_menu(session, actor).await
    }

    async fn main_menu(
        &self,
        session: SettingsSession,
        actor: &Actor,
    ) -> anyhow::Result<Transition> {
        let Some(user) = self.registry.find(actor.user_id).await? else {
            return Ok(Transition::end(Reply::NotRegistered));
        };

        let balances = self.ledger.balances(actor.user_id).await?;
        let recovered = self.recovery.is_recovered(actor.user_id).await?;

        let options = evaluate(self.config, &user, &balances, recovered);

        Ok(Transition::keep(
            session.into_state(SettingsState::MainMenu),
            Reply::MainMenu(options),
        ))
    }

    async fn on_button(
        &self,
        session: SettingsSession,
        actor: &Actor,
        button: SettingsButton,
    ) -> anyhow::Result<Transition> {
        use SettingsButton as B;
        use SettingsState as S;

        let transition = match (session.state(), button) {
            (_, B::Close) => Transition::end(Reply::Closed),
            (S::ConfirmingRecovery, B::Open | B::Back) => Transition::keep(session, Reply::Stale),
            (_, B::Open) => self.main_menu(session, actor).await?,
            (
                S::MainMenu
                | S::ConfirmNickChange
                | S::ConfirmIdChange
                | S::ConfirmDelete
                | S::FinalConfirmDelete,
                B::Back,
            ) => self.main_menu(session, actor).await?,
            (S::MainMenu, B::ExternalServices) => {
                Transition::keep(session, Reply::ExternalServices)
            },
            (S::MainMenu, B::NickChange) => {
                self.start_paid(session, actor, PaidAction::Nickname).await?
            },
            (S::MainMenu, B::IdChange) => self.start_paid(session, actor, PaidAction::BotId).await?,
            (S::MainMenu, B::DeleteAccount) => Transition::keep(
                session.into_state(S::ConfirmDelete),
                Reply::DeleteWarning,
            ),
            (S::MainMenu, B::StartRecovery) => self.start_recovery(session, actor).await?,
            (S::ConfirmNickChange, B::Pay(PaidAction::Nickname, kind)) => {
                self.pay(session, actor, PaidAction::Nickname, kind).await?
            },
            (S::ConfirmIdChange, B::Pay(PaidAction::BotId, kind)) => {
                self.pay(session, actor, PaidAction::BotId, kind).await?
            },
            (S::AwaitingId, B::GenerateId) => self.generate_bot_id(actor).await?,
            (S::ConfirmDelete, B::DeleteConfirm) => Transition::keep(
                session.into_state(S::FinalConfirmDelete),
                Reply::DeleteFinalWarning,
            ),
            (S::FinalConfirmDelete, B::DeleteFinalConfirm) => {
                let captcha = Captcha::generate();
                let word = captcha.word().to_owned();

                Transition::keep(session.into_captcha(captcha), Reply::CaptchaPrompt(word))
            },
            (S::ConfirmingRecovery, B::RecoveryConfirm) => {
                let outcome = self.recovery.confirm(actor.user_id).await?;

                Transition::end(Reply::RecoveryConfirmed(outcome))
            },
            (S::ConfirmingRecovery, B::RecoveryCancel) => {
                Transition::end(Reply::RecoveryCancelled)
            },
            _ => Transition::keep(session, Reply::Stale),
        };

        Ok(transition)
    }

    async fn on_text(
        &self,
        mut session: SettingsSession,
        actor: &Actor,
        text: &str,
    ) -> anyhow::Result<Transition> {
        match session.state() {
            SettingsState::AwaitingNickname => self.submit_nickname(session, actor, text).await,
            SettingsState::AwaitingId => self.submit_bot_id(session, actor, text).await,
            SettingsState::AwaitingCaptcha => {
                let Some(mut captcha) = session.take_captcha() else {
                    tracing::error!("Awaiting captcha without a captcha in session");

                    return Ok(Transition::end(Reply::Failed(Operation::Deletion)));
                };

                if captcha.matches(text) {
                    return self.delete_account(actor).await;
                }

                let attempts = captcha.fail();

                if attempts >= self.config.max_captcha_attempts {
                    tracing::info!(attempts, "Account deletion aborted after wrong captchas");

                    return Ok(Transition::end(Reply::CaptchaExhausted));
                }

                let remaining = self.config.max_captcha_attempts - attempts;
                session.put_captcha(captcha);

                Ok(Transition::keep(session, Reply::CaptchaWrong { remaining }))
            },
            _ => Ok(Transition::keep(session, Reply::Ignored)),
        }
    }

    async fn start_paid(
        &self,
        session: SettingsSession,
        actor: &Actor,
        action: PaidAction,
    ) -> anyhow::Result<Transition> {
        let Some(user) = self.registry.find(actor.user_id).await? else {
            return Ok(Transition::end(Reply::NotRegistered));
        };

        if user.is_privileged() {
            return Ok(Self::input_prompt(session, action, false));
        }

        let price = *self.config.price(action);
        let balances = self.ledger.balances(actor.user_id).await?;
        let affordable = price.affordable(&balances);

        if affordable.is_empty() {
            return Ok(Transition::keep(
                session.into_state(SettingsState::MainMenu),
                Reply::InsufficientFunds,
            ));
        }

        let state = match action {
            PaidAction::Nickname => SettingsState::ConfirmNickChange,
            PaidAction::BotId => SettingsState::ConfirmIdChange,
        };

        Ok(Transition::keep(
            session.into_state(state),
            Reply::PaymentChoice {
                action,
                price,
                affordable,
            },
        ))
    }

    async fn pay(
        &self,
        session: SettingsSession,
        actor: &Actor,
        action: PaidAction,
        kind: CurrencyKind,
    ) -> anyhow::Result<Transition> {
        let amount = self.config.price(action).amount(kind);

        let paid = self.ledger.subtract(actor.user_id, kind, amount).await?;

        if !paid {
            tracing::info!(%action, currency = kind.as_ref(), amount, "Payment declined");

            return Ok(Transition::keep(
                session.into_state(SettingsState::MainMenu),
                Reply::InsufficientFunds,
            ));
        }

        tracing::info!(%action, currency = kind.as_ref(), amount, "Payment accepted");

        Ok(Self::input_prompt(session, action, true))
    }

    fn input_prompt(session: SettingsSession, action: PaidAction, paid: bool) -> Transition {
        let state = match action {
            PaidAction::Nickname => SettingsState::AwaitingNickname,
            PaidAction::BotId => SettingsState::AwaitingId,
        };

        let session = if paid {
            session.into_prepaid(state)
        } else {
            session.into_state(state)
        };

        Self::prompt(session)
    }

    fn prompt(session: SettingsSession) -> Transition {
        let paid = session.is_prepaid();

        match session.state() {
            SettingsState::AwaitingNickname => {
                Transition::keep(session, Reply::NicknamePrompt { paid })
            },
            SettingsState::AwaitingId => Transition::keep(session, Reply::BotIdPrompt { paid }),
            _ => Transition::keep(session, Reply::Stale),
        }
    }

    /// Actions that would leave the current input without submitting it
    fn abandons(action: &Action) -> bool {
        use SettingsButton as B;

        matches!(
            action,
            Action::Open | Action::Cancel | Action::Button(B::Open | B::Close | B::Back)
        )
    }

    async fn submit_nickname(
        &self,
        session: SettingsSession,
        actor: &Actor,
        text: &str,
    ) -> anyhow::Result<Transition> {
        let nickname = text.trim();

        if !(1..=self.config.max_nickname_len).contains(&nickname.chars_len()) {
            return Ok(Transition::keep(session, Reply::NicknameInvalid));
        }

        if !self.registry.set_nickname(actor.user_id, nickname).await? {
            return Ok(Transition::end(Reply::Failed(Operation::Nickname)));
        }

        Ok(Transition::end(Reply::NicknameChanged(nickname.to_owned())))
    }

    async fn submit_bot_id(
        &self,
        session: SettingsSession,
        actor: &Actor,
        text: &str,
    ) -> anyhow::Result<Transition> {
        let bot_id = text.trim().to_uppercase();

        let transition = match self.registry.set_bot_id(actor.user_id, &bot_id).await? {
            BotIdChange::Accepted(bot_id) => Transition::end(Reply::BotIdChanged(bot_id)),
            BotIdChange::Rejected(reason) => {
                Transition::keep(session, Reply::BotIdRejected(reason))
            },
        };

        Ok(transition)
    }

    async fn generate_bot_id(&self, actor: &Actor) -> anyhow::Result<Transition> {
        let transition = match self.registry.regenerate_bot_id(actor.user_id).await? {
            Some(bot_id) => Transition::end(Reply::BotIdChanged(bot_id)),
            None => Transition::end(Reply::Failed(Operation::BotId)),
        };

        Ok(transition)
    }

    async fn delete_account(&self, actor: &Actor) -> anyhow::Result<Transition> {
        if !self.registry.delete_account(actor.user_id).await? {
            return Ok(Transition::end(Reply::Failed(Operation::Deletion)));
        }

        tracing::info!("Account deleted");

        Ok(Transition::end(Reply::AccountDeleted))
    }

    async fn start_recovery(
        &self,
        session: SettingsSession,
        actor: &Actor,
    ) -> anyhow::Result<Transition> {
        let Some(user) = self.registry.find(actor.user_id).await? else {
            return Ok(Transition::end(Reply::NotRegistered));
        };

        let recovered = self.recovery.is_recovered(actor.user_id).await?;

        if !recovery_visible(
            recovered,
            user.created_at_utc(),
            self.config.recovery_cutoff,
        ) {
            return self.main_menu(session, actor).await;
        }

        self.recovery
            .schedule_search(actor.chat_id, actor.user_id)
            .await?;

        Ok(Transition::keep(
            session.into_state(SettingsState::ConfirmingRecovery),
            Reply::RecoveryStarted,
        ))
    }
}
