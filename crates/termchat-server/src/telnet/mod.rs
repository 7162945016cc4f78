//! Telnet front end: accept loop and per-connection wiring.

pub mod chat_mode;
pub mod codec;
pub mod commands;
pub mod session;
pub mod writer;

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::state::AppState;

use self::session::Session;
use self::writer::SessionWriter;

/// Accept connections until `shutdown` fires. Each connection runs in its
/// own task; an accept error is logged and the loop keeps going.
pub async fn serve(listener: TcpListener, app: AppState, shutdown: CancellationToken) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("telnet listener stopping");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "failed to accept telnet connection");
                    continue;
                }
            },
        };
        if let Err(err) = stream.set_nodelay(true) {
            debug!(error = %err, %peer, "could not disable nagle");
        }
        tokio::spawn(handle_connection(stream, peer, app.clone()));
    }
}

/// Run one connection to completion over any byte stream.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, app: AppState)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let span = info_span!("session", conn = %Uuid::now_v7(), %peer);
    async move {
        info!("connection opened");
        let (reader, writer) = tokio::io::split(stream);
        let (out, writer_task) = SessionWriter::spawn(writer);

        if let Err(err) = Session::new(reader, out, app).run().await {
            debug!(error = %err, "session ended early");
        }
        if let Err(err) = writer_task.await {
            warn!(error = %err, "connection writer task failed");
        }
        info!("connection closed");
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use termchat_core::repository::user::UserDirectory;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    use super::*;
    use crate::state::tests::test_state;

    const WAIT: Duration = Duration::from_secs(5);

    /// Scripted telnet client over an in-memory duplex stream.
    struct Client {
        stream: DuplexStream,
        buf: String,
        task: JoinHandle<()>,
    }

    impl Client {
        async fn connect(app: &AppState) -> Self {
            let (client, server) = tokio::io::duplex(64 * 1024);
            let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
            let task = tokio::spawn(handle_connection(server, peer, app.clone()));
            let mut client = Self {
                stream: client,
                buf: String::new(),
                task,
            };
            client.expect("Welcome to TermChat").await;
            client.prompt().await;
            client
        }

        /// Connect and log in as an account created directly in the directory.
        async fn login(app: &AppState, name: &str) -> Self {
            let email = format!("{name}@example.com");
            if app.users.lookup_by_username(name).await.unwrap().is_none() {
                app.users.create_account(&email, name, "pw").await.unwrap();
            }
            let mut client = Self::connect(app).await;
            client.send(&format!("/login {email} pw")).await;
            client.expect(&format!("Welcome {name}!")).await;
            client.prompt().await;
            client
        }

        async fn send(&mut self, line: &str) {
            self.send_bytes(format!("{line}\r\n").as_bytes()).await;
        }

        async fn send_bytes(&mut self, bytes: &[u8]) {
            self.stream.write_all(bytes).await.unwrap();
        }

        /// Read until `needle` shows up; returns everything up to and
        /// including it.
        async fn expect(&mut self, needle: &str) -> String {
            loop {
                if let Some(pos) = self.buf.find(needle) {
                    return self.buf.drain(..pos + needle.len()).collect();
                }
                let mut chunk = [0u8; 4096];
                let n = tokio::time::timeout(WAIT, self.stream.read(&mut chunk))
                    .await
                    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}, have {:?}", self.buf))
                    .unwrap();
                assert!(n > 0, "connection closed waiting for {needle:?}, have {:?}", self.buf);
                self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            }
        }

        async fn prompt(&mut self) -> String {
            self.expect("\n> ").await
        }

        async fn enter_chat(&mut self, command: &str, partner: &str) -> String {
            self.send(&format!("{command} {partner}")).await;
            let seen = self.expect("Type your message. Use /exit to leave chat.").await;
            self.expect(&format!("[{partner}]> ")).await;
            seen
        }

        async fn hang_up(self) {
            drop(self.stream);
            tokio::time::timeout(WAIT, self.task)
                .await
                .expect("session did not end after disconnect")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_register_and_login_flow() {
        let (app, _dir) = test_state().await;
        let mut c = Client::connect(&app).await;

        c.send("/register alice@example.com alice secret").await;
        c.expect("User registered successfully").await;
        c.send("/signup alice@example.com alice2 secret").await;
        c.expect("Register failed: email already registered").await;
        c.send("/register other@example.com ALICE secret").await;
        c.expect("Register failed: username already taken").await;
        c.send("/register nobody").await;
        c.expect("Usage: /register <email> <username> <password>").await;

        c.send("/login alice@example.com wrong").await;
        c.expect("Login failed: invalid password").await;
        c.send("/login ghost@example.com secret").await;
        c.expect("Login failed: user not found").await;
        c.send("/signin alice@example.com secret").await;
        c.expect("Welcome alice!").await;
        c.send("/whoami").await;
        c.expect("You are logged in as: alice").await;
        c.hang_up().await;
    }

    #[tokio::test]
    async fn test_anonymous_session_is_gated() {
        let (app, _dir) = test_state().await;
        let mut c = Client::connect(&app).await;

        for command in ["/chat bob", "/chat", "/send bob hi", "/room", "/whoami", "/search a"] {
            c.send(command).await;
            c.expect("Please login first").await;
            c.prompt().await;
        }
        c.send("/ping").await;
        c.expect("PONG").await;
        c.send("/version").await;
        c.expect(&format!("TermChat server v{}", env!("CARGO_PKG_VERSION"))).await;
        c.send("/dance").await;
        c.expect("Unknown command\nType /help for a list of commands.").await;
        c.send("/help").await;
        c.expect("Available commands:").await;
        c.send("/exit").await;
        c.expect("Bye!").await;
        tokio::time::timeout(WAIT, c.task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_overlong_line_is_rejected() {
        let (app, _dir) = test_state().await;
        let mut c = Client::connect(&app).await;
        let long = "x".repeat(app.config.max_line_length + 10);
        c.send(&long).await;
        c.expect("Line too long").await;
        c.send("/ping").await;
        c.expect("PONG").await;
        c.hang_up().await;
    }

    #[tokio::test]
    async fn test_latin1_line_keeps_session() {
        let (app, _dir) = test_state().await;
        let mut c = Client::connect(&app).await;

        // Bad line and the next command arrive in one write.
        c.send_bytes(b"caf\xe9\r\n/ping\r\n").await;
        c.expect("Invalid input").await;
        c.expect("PONG").await;
        c.prompt().await;
        c.send_bytes(b"\xff\xfe\r\n").await;
        c.expect("Invalid input").await;
        c.send("/ping").await;
        c.expect("PONG").await;
        c.hang_up().await;
    }

    #[tokio::test]
    async fn test_latin1_line_in_chat_keeps_chat() {
        let (app, _dir) = test_state().await;
        let mut alice = Client::login(&app, "alice").await;
        let mut bob = Client::login(&app, "bob").await;

        alice.enter_chat("/chat", "bob").await;
        bob.enter_chat("/chat", "alice").await;

        alice.send_bytes(b"caf\xe9\r\n").await;
        alice.expect("Invalid input").await;
        alice.send("still here").await;
        let seen = bob.expect("alice: still here").await;
        assert!(!seen.contains("caf"), "bad line was relayed: {seen:?}");
        assert_eq!(app.chat.bus().channel_count(), 1);

        alice.hang_up().await;
        bob.hang_up().await;
    }

    #[tokio::test]
    async fn test_send_then_chat_shows_history_once() {
        let (app, _dir) = test_state().await;
        let mut alice = Client::login(&app, "alice").await;
        let mut bob = Client::login(&app, "bob").await;

        alice.send("/send bob hello | bob").await;
        alice.expect("Message sent.").await;
        alice.send("/send alice talking to myself").await;
        alice.expect("You cannot send a message to yourself.").await;
        alice.send("/send ghost anyone?").await;
        alice.expect("Failed to send message: user 'ghost' not found").await;

        let seen = bob.enter_chat("/chat", "alice").await;
        assert!(seen.contains("----- Chat with alice -----"));
        assert!(seen.contains("] alice: hello | bob"));

        bob.send("/exit").await;
        let after = bob.expect("Exiting chat...").await;
        assert!(!after.contains("hello | bob"), "history replayed live: {after:?}");
        bob.prompt().await;

        bob.send("/room").await;
        bob.expect("Chatting with:\n- alice").await;
        bob.send("/last alice").await;
        let last = bob.expect("] alice: hello | bob").await;
        assert!(last.contains("Last 5 messages with alice:"));

        alice.send("/last bob").await;
        alice.expect("] You: hello | bob").await;

        alice.hang_up().await;
        bob.hang_up().await;
    }

    #[tokio::test]
    async fn test_durable_chat_relays_live() {
        let (app, _dir) = test_state().await;
        let mut alice = Client::login(&app, "alice").await;
        let mut bob = Client::login(&app, "bob").await;

        alice.enter_chat("/chat", "bob").await;
        bob.enter_chat("/chat", "alice").await;

        alice.send("hi bob").await;
        bob.expect("] alice: hi bob\n[alice]> ").await;
        bob.send("hi alice").await;
        alice.expect("] bob: hi alice\n[bob]> ").await;

        // Both lines are persisted; a fresh chat replays them in order.
        alice.send("/exit").await;
        alice.expect("Exiting chat...").await;
        alice.prompt().await;
        let seen = alice.enter_chat("/chat", "bob").await;
        let first = seen.find("You: hi bob").unwrap();
        let second = seen.find("bob: hi alice").unwrap();
        assert!(first < second);

        alice.hang_up().await;
        bob.hang_up().await;
    }

    #[tokio::test]
    async fn test_tempchat_exchange_and_peer_exit() {
        let (app, _dir) = test_state().await;
        let mut alice = Client::login(&app, "alice").await;
        let mut bob = Client::login(&app, "bob").await;

        alice.enter_chat("/tempchat", "bob").await;
        bob.enter_chat("/temp", "alice").await;

        alice.send("one").await;
        bob.expect("] alice: one").await;
        bob.send("two").await;
        alice.expect("] bob: two").await;
        alice.send("three").await;
        bob.expect("] alice: three").await;

        alice.send("/exit").await;
        alice.expect("Exiting temporary chat...").await;
        alice.prompt().await;

        // Bob is dropped back to the command loop without typing anything.
        bob.expect("alice has left. Temporary chat closed.").await;
        bob.prompt().await;
        bob.send("/whoami").await;
        bob.expect("You are logged in as: bob").await;

        // Nothing from the temporary chat was stored.
        alice.send("/room").await;
        alice.expect("No chat rooms found.").await;

        alice.hang_up().await;
        bob.hang_up().await;
        assert_eq!(app.chat.bus().channel_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_entry_rejections() {
        let (app, _dir) = test_state().await;
        let mut alice = Client::login(&app, "alice").await;

        alice.send("/chat alice").await;
        alice.expect("You cannot chat with yourself.").await;
        alice.send("/tempchat ghost").await;
        alice.expect("User ghost not found").await;
        alice.send("/chat").await;
        alice.expect("Usage: /chat <username>").await;
        alice.hang_up().await;
    }

    #[tokio::test]
    async fn test_disconnect_in_chat_releases_channel() {
        let (app, _dir) = test_state().await;
        app.users
            .create_account("bob@example.com", "bob", "pw")
            .await
            .unwrap();
        let mut alice = Client::login(&app, "alice").await;

        alice.enter_chat("/chat", "bob").await;
        assert_eq!(app.chat.bus().channel_count(), 1);

        alice.hang_up().await;
        assert_eq!(app.chat.bus().channel_count(), 0);
    }

    #[tokio::test]
    async fn test_search_lists_matches() {
        let (app, _dir) = test_state().await;
        for name in ["albert", "bob"] {
            app.users
                .create_account(&format!("{name}@example.com"), name, "pw")
                .await
                .unwrap();
        }
        let mut alice = Client::login(&app, "alice").await;

        alice.send("/search al").await;
        let seen = alice.expect("- alice (email: alice@example.com)").await;
        assert!(seen.contains("Matching users:\n- albert (email: albert@example.com)"));
        alice.send("/search zed").await;
        alice.expect("No users found.").await;
        alice.hang_up().await;
    }
}
