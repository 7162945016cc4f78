//! Per-connection session state machine.
//!
//! `Anonymous -> Authenticated -> InChat -> Authenticated -> Closed`.
//! While in a chat the state owns the cancellation token shared by the input
//! loop and the relay listener. Leaving the chat or closing the session fires
//! it; firing it more than once is a no-op.

use termchat_types::chat::ChatMode;
use termchat_types::error::SessionError;
use termchat_types::user::Account;
use tokio_util::sync::CancellationToken;

/// The chat a session is currently in.
#[derive(Debug)]
pub struct ActiveChat {
    pub account: Account,
    pub partner: String,
    pub mode: ChatMode,
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Account),
    InChat(ActiveChat),
    Closed,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The logged-in account, in or out of a chat.
    pub fn account(&self) -> Option<&Account> {
        match self {
            SessionState::Authenticated(account) => Some(account),
            SessionState::InChat(chat) => Some(&chat.account),
            SessionState::Anonymous | SessionState::Closed => None,
        }
    }

    pub fn require_account(&self) -> Result<&Account, SessionError> {
        self.account().ok_or(SessionError::NotAuthenticated)
    }

    /// Record a successful login. Logging in again switches accounts.
    pub fn authenticate(&mut self, account: Account) -> Result<(), SessionError> {
        match self {
            SessionState::Anonymous | SessionState::Authenticated(_) => {
                *self = SessionState::Authenticated(account);
                Ok(())
            }
            SessionState::InChat(_) => Err(SessionError::AlreadyInChat),
            SessionState::Closed => Err(SessionError::NotAuthenticated),
        }
    }

    /// Enter a chat with `partner`. Returns the token the listener and input
    /// loop share for this chat.
    pub fn enter_chat(
        &mut self,
        partner: impl Into<String>,
        mode: ChatMode,
    ) -> Result<CancellationToken, SessionError> {
        match std::mem::take(self) {
            SessionState::Authenticated(account) => {
                let cancel = CancellationToken::new();
                *self = SessionState::InChat(ActiveChat {
                    account,
                    partner: partner.into(),
                    mode,
                    cancel: cancel.clone(),
                });
                Ok(cancel)
            }
            SessionState::InChat(chat) => {
                *self = SessionState::InChat(chat);
                Err(SessionError::AlreadyInChat)
            }
            other => {
                *self = other;
                Err(SessionError::NotAuthenticated)
            }
        }
    }

    /// Leave the current chat, firing its token.
    pub fn leave_chat(&mut self) -> Result<ActiveChat, SessionError> {
        match std::mem::take(self) {
            SessionState::InChat(chat) => {
                chat.cancel.cancel();
                *self = SessionState::Authenticated(chat.account.clone());
                Ok(chat)
            }
            other => {
                *self = other;
                Err(SessionError::NotInChat)
            }
        }
    }

    /// Terminal transition on disconnect. Fires any live chat token.
    pub fn close(&mut self) {
        if let SessionState::InChat(chat) = self {
            chat.cancel.cancel();
        }
        *self = SessionState::Closed;
    }
}
