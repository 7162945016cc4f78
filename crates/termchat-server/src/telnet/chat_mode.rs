//! Chat mode: entering a chat, the input loop, and the relay listener.
//!
//! The input loop and the listener share the chat's cancellation token. The
//! listener fires it when an ephemeral partner leaves; the input loop fires
//! it on `/exit` or disconnect. Either way the listener is joined before the
//! session returns to the command loop.

use termchat_core::chat::delivery::{Delivery, classify};
use termchat_core::relay::Subscription;
use termchat_core::repository::user::UserDirectory;
use termchat_types::chat::{ChatIdentity, ChatMode, DISPLAY_TIME_FORMAT};
use termchat_types::relay::RelayChannel;
use termchat_types::user::Account;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::session::{Flow, Session, log_store_error};
use super::writer::SessionWriter;

/// Where lines typed in the chat go.
#[derive(Debug, Clone, Copy)]
enum Room {
    Durable(ChatIdentity),
    Ephemeral,
}

impl Room {
    fn mode(self) -> ChatMode {
        match self {
            Room::Durable(_) => ChatMode::Durable,
            Room::Ephemeral => ChatMode::Ephemeral,
        }
    }
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub(super) async fn open_chat(&mut self, partner: &str, mode: ChatMode) -> anyhow::Result<Flow> {
        let Some(me) = self.state.account().cloned() else {
            return Ok(Flow::Continue);
        };
        if partner.eq_ignore_ascii_case(&me.username) {
            self.out.line("You cannot chat with yourself.").await?;
            return Ok(Flow::Continue);
        }

        let partner = match self.app.users.lookup_by_username(partner).await {
            Ok(Some(account)) => account.username,
            Ok(None) => {
                self.out.line(format!("User {partner} not found")).await?;
                return Ok(Flow::Continue);
            }
            Err(err) => {
                warn!(error = %err, "partner lookup failed");
                self.out.line(format!("Failed to open chat: {err}")).await?;
                return Ok(Flow::Continue);
            }
        };

        let (room, channel) = match mode {
            ChatMode::Durable => {
                let durable = match self.app.chat.open_durable(&me.username, &partner).await {
                    Ok(durable) => durable,
                    Err(err) => {
                        log_store_error(&err, "open chat");
                        self.out.line(format!("Failed to get messages: {err}")).await?;
                        return Ok(Flow::Continue);
                    }
                };
                let mut text = format!("----- Chat with {partner} -----");
                for message in &durable.history {
                    text.push('\n');
                    text.push_str(&message.render_for(me.id));
                }
                self.out.line(text).await?;
                (Room::Durable(durable.chat), durable.channel)
            }
            ChatMode::Ephemeral => {
                self.out
                    .line(format!("----- Temporary Chat with {partner} -----"))
                    .await?;
                (Room::Ephemeral, RelayChannel::ephemeral(&me.username, &partner))
            }
        };

        let span = info_span!("chat", channel = %channel, partner = %partner);
        self.run_chat(me, partner, room, channel).instrument(span).await
    }

    async fn run_chat(
        &mut self,
        me: Account,
        partner: String,
        room: Room,
        channel: RelayChannel,
    ) -> anyhow::Result<Flow> {
        let subscription = self.app.chat.subscribe(&channel);
        let cancel = self.state.enter_chat(partner.clone(), room.mode())?;
        info!("entered chat");

        let listener = tokio::spawn(
            listen(
                subscription,
                me.username.clone(),
                partner.clone(),
                room.mode(),
                self.out.clone(),
                cancel.clone(),
            )
            .in_current_span(),
        );

        let flow = match self.out.line("Type your message. Use /exit to leave chat.").await {
            Ok(()) => self.chat_input(&me, &partner, room, &cancel).await,
            Err(err) => Err(err),
        };

        cancel.cancel();
        if self.state.leave_chat().is_err() {
            debug!("session left chat state before teardown");
        }
        if let Err(err) = listener.await {
            warn!(error = %err, "chat listener task failed");
        }
        info!("left chat");
        flow
    }

    async fn chat_input(
        &mut self,
        me: &Account,
        partner: &str,
        room: Room,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Flow> {
        loop {
            self.out.send(format!("[{partner}]> ")).await?;
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Flow::Continue),
                line = self.read_line() => line,
            };
            let Some(line) = line else {
                return Ok(Flow::Quit);
            };
            let body = line.trim();
            if body.is_empty() {
                continue;
            }

            if body.eq_ignore_ascii_case("/exit") {
                match room {
                    Room::Durable(_) => self.out.line("Exiting chat...").await?,
                    Room::Ephemeral => {
                        self.out.line("Exiting temporary chat...").await?;
                        self.app.chat.close_ephemeral(&me.username, partner);
                    }
                }
                return Ok(Flow::Continue);
            }

            match room {
                Room::Durable(chat) => {
                    if let Err(err) = self.app.chat.post_durable(&me.username, chat, body).await {
                        log_store_error(&err, "post");
                        self.out.line(format!("Send failed: {err}")).await?;
                    }
                }
                Room::Ephemeral => {
                    let reached = self.app.chat.post_ephemeral(&me.username, partner, body);
                    debug!(reached, "ephemeral message relayed");
                }
            }
        }
    }
}

/// Relay listener for one chat. Runs until the token fires, the channel
/// closes, or the connection's writer is gone.
async fn listen(
    mut subscription: Subscription,
    me: String,
    partner: String,
    mode: ChatMode,
    out: SessionWriter,
    cancel: CancellationToken,
) {
    loop {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            raw = subscription.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        match classify(&raw, &me, mode) {
            Delivery::Show {
                sender,
                timestamp,
                body,
            } => {
                let text = format!(
                    "\n[{}] {}: {}\n[{}]> ",
                    timestamp.format(DISPLAY_TIME_FORMAT),
                    sender,
                    body,
                    partner
                );
                if out.send(text).await.is_err() {
                    break;
                }
            }
            Delivery::PeerLeft(sender) => {
                info!(%sender, "partner left temporary chat");
                let _ = out
                    .send(format!("\n{sender} has left. Temporary chat closed.\n"))
                    .await;
                cancel.cancel();
                break;
            }
            Delivery::Skip => {}
        }
    }
    debug!(channel = subscription.channel(), "chat listener stopped");
}
