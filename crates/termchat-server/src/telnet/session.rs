//! One telnet connection: the command loop outside chat mode.
//!
//! Chat mode itself lives in [`super::chat_mode`]. The session owns the
//! framed input, a handle to the writer task, and the connection's
//! [`SessionState`].

use futures_util::StreamExt;
use termchat_core::chat::session::SessionState;
use termchat_core::repository::message::MessageStore;
use termchat_core::repository::user::UserDirectory;
use termchat_types::chat::ChatMode;
use termchat_types::error::{StoreError, UserError};
use termchat_types::user::Account;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::state::AppState;

use super::codec::{Input, InputCodec};
use super::commands::{self, ABOUT, Command, HELP, WELCOME};
use super::writer::SessionWriter;

const PROMPT: &str = "> ";
const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Whether the connection stays open after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Quit,
}

pub struct Session<R> {
    pub(super) lines: FramedRead<R, InputCodec>,
    pub(super) out: SessionWriter,
    pub(super) state: SessionState,
    pub(super) app: AppState,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R, out: SessionWriter, app: AppState) -> Self {
        let codec = InputCodec::new(app.config.max_line_length);
        Self {
            lines: FramedRead::new(reader, codec),
            out,
            state: SessionState::new(),
            app,
        }
    }

    /// Drive the connection until the client quits or disconnects.
    ///
    /// The state is closed on every exit path, which fires any live chat
    /// token.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let result = self.command_loop().await;
        self.state.close();
        result
    }

    async fn command_loop(&mut self) -> anyhow::Result<()> {
        self.out.line(WELCOME).await?;
        loop {
            self.out.send(PROMPT).await?;
            let Some(line) = self.read_line().await else {
                debug!("client disconnected");
                return Ok(());
            };
            if self.dispatch(commands::parse(&line)).await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Next input line, or `None` once the transport is done.
    ///
    /// Overlong and non-UTF-8 lines are reported and skipped. Cancel safe as
    /// long as the notice is not interrupted.
    pub(super) async fn read_line(&mut self) -> Option<String> {
        loop {
            let notice = match self.lines.next().await {
                Some(Ok(Input::Line(line))) => return Some(line),
                Some(Ok(Input::TooLong)) => "Line too long",
                Some(Ok(Input::NotUtf8)) => "Invalid input",
                Some(Err(err)) => {
                    debug!(error = %err, "read failed");
                    return None;
                }
                None => return None,
            };
            if self.out.line(notice).await.is_err() {
                return None;
            }
        }
    }

    fn account(&self) -> Option<Account> {
        self.state.account().cloned()
    }

    async fn dispatch(&mut self, command: Command) -> anyhow::Result<Flow> {
        if command.requires_login()
            && let Err(err) = self.state.require_account()
        {
            self.out.line(err.to_string()).await?;
            return Ok(Flow::Continue);
        }

        match command {
            Command::Empty => {}
            Command::Register {
                email,
                username,
                password,
            } => self.register(&email, &username, &password).await?,
            Command::Login { email, password } => self.login(&email, &password).await?,
            Command::Chat { partner } => return self.open_chat(&partner, ChatMode::Durable).await,
            Command::TempChat { partner } => return self.open_chat(&partner, ChatMode::Ephemeral).await,
            Command::Send { partner, text } => self.send_direct(&partner, &text).await?,
            Command::Rooms => self.list_rooms().await?,
            Command::Last { partner } => self.show_last(&partner).await?,
            Command::Search { prefix } => self.search(&prefix).await?,
            Command::WhoAmI => {
                if let Some(me) = self.state.account() {
                    let text = format!("You are logged in as: {}", me.username);
                    self.out.line(text).await?;
                }
            }
            Command::Ping => self.out.line("PONG").await?,
            Command::Version => {
                self.out
                    .line(format!("TermChat server v{}", env!("CARGO_PKG_VERSION")))
                    .await?
            }
            Command::About => self.out.line(ABOUT).await?,
            Command::Help => self.out.line(HELP).await?,
            Command::Clear => {
                self.out.send(CLEAR_SCREEN).await?;
                self.out.line("Terminal cleared.").await?;
            }
            Command::Exit => {
                self.out.line("Bye!").await?;
                return Ok(Flow::Quit);
            }
            Command::Usage(usage) => self.out.line(usage.text()).await?,
            Command::Unknown(head) => {
                debug!(command = %head, "unknown command");
                self.out
                    .line("Unknown command\nType /help for a list of commands.")
                    .await?
            }
        }
        Ok(Flow::Continue)
    }

    async fn register(&mut self, email: &str, username: &str, password: &str) -> anyhow::Result<()> {
        match self.app.users.create_account(email, username, password).await {
            Ok(account) => {
                info!(user_id = account.id, username = %account.username, "account registered");
                self.out.line("User registered successfully").await
            }
            Err(err) => {
                log_user_error(&err, "register");
                self.out.line(format!("Register failed: {err}")).await
            }
        }
    }

    async fn login(&mut self, email: &str, password: &str) -> anyhow::Result<()> {
        let account = match self.app.users.authenticate(email, password).await {
            Ok(account) => account,
            Err(err) => {
                log_user_error(&err, "login");
                return self.out.line(format!("Login failed: {err}")).await;
            }
        };
        if let Err(err) = self.state.authenticate(account.clone()) {
            return self.out.line(format!("Login failed: {err}")).await;
        }
        info!(user_id = account.id, username = %account.username, "logged in");
        self.out.line(format!("Welcome {}!", account.username)).await
    }

    async fn send_direct(&mut self, partner: &str, text: &str) -> anyhow::Result<()> {
        let Some(me) = self.account() else {
            return Ok(());
        };
        if partner.eq_ignore_ascii_case(&me.username) {
            return self.out.line("You cannot send a message to yourself.").await;
        }
        match self.app.chat.send_direct(&me.username, partner, text).await {
            Ok(message) => {
                debug!(message_id = message.id, chat = %message.chat_id, "direct message stored");
                self.out.line("Message sent.").await
            }
            Err(err) => {
                log_store_error(&err, "send");
                self.out.line(format!("Failed to send message: {err}")).await
            }
        }
    }

    async fn list_rooms(&mut self) -> anyhow::Result<()> {
        let Some(me) = self.account() else {
            return Ok(());
        };
        let partners = match self.app.chat.store().partners(&me.username).await {
            Ok(partners) => partners,
            Err(err) => {
                log_store_error(&err, "rooms");
                return self
                    .out
                    .line(format!("Failed to retrieve chat rooms: {err}"))
                    .await;
            }
        };
        if partners.is_empty() {
            return self.out.line("No chat rooms found.").await;
        }
        let mut text = String::from("Chatting with:");
        for name in partners {
            text.push_str("\n- ");
            text.push_str(&name);
        }
        self.out.line(text).await
    }

    async fn show_last(&mut self, partner: &str) -> anyhow::Result<()> {
        let Some(me) = self.account() else {
            return Ok(());
        };
        let n = self.app.config.history_preview;
        let messages = match self.app.chat.store().recent(&me.username, partner, n).await {
            Ok(messages) => messages,
            Err(err) => {
                log_store_error(&err, "last");
                return self
                    .out
                    .line(format!("Failed to fetch messages: {err}"))
                    .await;
            }
        };
        let mut text = format!("Last {n} messages with {partner}:");
        for message in &messages {
            text.push('\n');
            text.push_str(&message.render_for(me.id));
        }
        self.out.line(text).await
    }

    async fn search(&mut self, prefix: &str) -> anyhow::Result<()> {
        let found = match self.app.users.search_by_name_prefix(prefix).await {
            Ok(found) => found,
            Err(err) => {
                log_user_error(&err, "search");
                return self.out.line(format!("Search failed: {err}")).await;
            }
        };
        if found.is_empty() {
            return self.out.line("No users found.").await;
        }
        let mut text = String::from("Matching users:");
        for account in found {
            text.push_str(&format!("\n- {} (email: {})", account.username, account.email));
        }
        self.out.line(text).await
    }
}

pub(super) fn log_store_error(err: &StoreError, op: &str) {
    match err.detail() {
        Some(detail) => warn!(op, detail, "message store failure"),
        None => debug!(op, error = %err, "message store rejected request"),
    }
}

fn log_user_error(err: &UserError, op: &str) {
    match err {
        UserError::Backend(detail) => warn!(op, detail = %detail, "user directory failure"),
        other => debug!(op, error = %other, "user directory rejected request"),
    }
}
