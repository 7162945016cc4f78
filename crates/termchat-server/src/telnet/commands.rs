//! Command table for the line protocol.
//!
//! Every command starts with `/`. Synonyms map onto the same `Command`.
//! Arguments are whitespace-separated; `/send` keeps everything after the
//! partner as the message body.

/// A parsed input line outside chat mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        email: String,
        username: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Chat {
        partner: String,
    },
    TempChat {
        partner: String,
    },
    Send {
        partner: String,
        text: String,
    },
    Rooms,
    Last {
        partner: String,
    },
    Search {
        prefix: String,
    },
    WhoAmI,
    Ping,
    Version,
    About,
    Help,
    Clear,
    Exit,
    /// A known command with missing or extra arguments.
    Usage(Usage),
    /// Blank line.
    Empty,
    Unknown(String),
}

/// Commands that can be invoked with the wrong arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Register,
    Login,
    Chat,
    TempChat,
    Send,
    Last,
    Search,
}

impl Usage {
    pub fn text(&self) -> &'static str {
        match self {
            Usage::Register => "Usage: /register <email> <username> <password>",
            Usage::Login => "Usage: /login <email> <password>",
            Usage::Chat => "Usage: /chat <username>",
            Usage::TempChat => "Usage: /tempchat <username>",
            Usage::Send => "Usage: /send <receiver_username> <message>",
            Usage::Last => "Usage: /last <username>",
            Usage::Search => "Usage: /search <username_prefix>",
        }
    }

    fn requires_login(&self) -> bool {
        !matches!(self, Usage::Register | Usage::Login)
    }
}

impl Command {
    /// Whether the command needs a logged-in session.
    ///
    /// Checked before usage errors, so an anonymous `/chat` with no partner
    /// still answers "Please login first".
    pub fn requires_login(&self) -> bool {
        match self {
            Command::Chat { .. }
            | Command::TempChat { .. }
            | Command::Send { .. }
            | Command::Rooms
            | Command::Last { .. }
            | Command::Search { .. }
            | Command::WhoAmI
            | Command::Clear => true,
            Command::Usage(usage) => usage.requires_login(),
            _ => false,
        }
    }
}

/// Exactly one argument, or `None`.
fn single(rest: &str) -> Option<String> {
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(arg), None) => Some(arg.to_string()),
        _ => None,
    }
}

/// Parse one input line.
pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let (head, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(h, r)| (h, r.trim()))
        .unwrap_or((trimmed, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    match head.to_lowercase().as_str() {
        "/register" | "/signup" | "/create" | "/new" | "/add" => match args.as_slice() {
            [email, username, password] => Command::Register {
                email: email.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => Command::Usage(Usage::Register),
        },
        "/login" | "/signin" => match args.as_slice() {
            [email, password] => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => Command::Usage(Usage::Login),
        },
        "/chat" => single(rest)
            .map(|partner| Command::Chat { partner })
            .unwrap_or(Command::Usage(Usage::Chat)),
        "/tempchat" | "/temp" | "/tempdm" => single(rest)
            .map(|partner| Command::TempChat { partner })
            .unwrap_or(Command::Usage(Usage::TempChat)),
        "/send" | "/message" | "/msg" | "/dm" | "/direct" => {
            match rest.split_once(char::is_whitespace) {
                Some((partner, text)) if !text.trim().is_empty() => Command::Send {
                    partner: partner.to_string(),
                    text: text.trim().to_string(),
                },
                _ => Command::Usage(Usage::Send),
            }
        }
        "/room" | "/rooms" | "/chatrooms" | "/recent" => Command::Rooms,
        "/last" | "/history" | "/last5" => single(rest)
            .map(|partner| Command::Last { partner })
            .unwrap_or(Command::Usage(Usage::Last)),
        "/search" => single(rest)
            .map(|prefix| Command::Search { prefix })
            .unwrap_or(Command::Usage(Usage::Search)),
        "/whoami" => Command::WhoAmI,
        "/ping" => Command::Ping,
        "/version" => Command::Version,
        "/about" => Command::About,
        "/help" => Command::Help,
        "/clear" => Command::Clear,
        "/exit" => Command::Exit,
        _ => Command::Unknown(head.to_string()),
    }
}

pub const HELP: &str = "\
Available commands:
/register <email> <username> <password> - Register a new user (also /signup, /create, /new, /add)
/login <email> <password> - Login to your account (also /signin)
/chat <username> - Start a chat with a user, with history
/tempchat <username> - Start a temporary chat, nothing is saved (also /temp, /tempdm)
/send <username> <message> - Send a message to a user (also /message, /msg, /dm, /direct)
/room - List your chat rooms (also /rooms, /chatrooms, /recent)
/last <username> - Show the latest messages with a user (also /history, /last5)
/search <prefix> - Find users by name
/whoami, /ping, /version, /about, /clear, /help
/exit - Exit the CLI";

pub const ABOUT: &str = "\
TermChat is a terminal-based chat application.
Register, log in, and chat with others in real time over telnet.
Messages in regular chats are stored encrypted; temporary chats are never saved.
Use /help to view available commands.";

pub const WELCOME: &str = "\
Welcome to TermChat CLI over Telnet!
Commands: /register <email> <username> <password>, /login <email> <password>, /chat <user>, /send <user> <message>, /room, /help, /exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_synonyms() {
        let expected = Command::Register {
            email: "a@b.c".to_string(),
            username: "alice".to_string(),
            password: "pw".to_string(),
        };
        for cmd in ["/register", "/signup", "/create", "/new", "/add", "/REGISTER"] {
            assert_eq!(parse(&format!("{cmd} a@b.c alice pw")), expected, "{cmd}");
        }
        assert_eq!(parse("/register a@b.c alice"), Command::Usage(Usage::Register));
        assert_eq!(
            parse("/register a@b.c alice pw extra"),
            Command::Usage(Usage::Register)
        );
    }

    #[test]
    fn test_login() {
        assert_eq!(
            parse("/signin  a@b.c   pw "),
            Command::Login {
                email: "a@b.c".to_string(),
                password: "pw".to_string()
            }
        );
        assert_eq!(parse("/login"), Command::Usage(Usage::Login));
    }

    #[test]
    fn test_chat_commands() {
        assert_eq!(
            parse("/chat bob"),
            Command::Chat {
                partner: "bob".to_string()
            }
        );
        for cmd in ["/tempchat", "/temp", "/tempdm"] {
            assert_eq!(
                parse(&format!("{cmd} bob")),
                Command::TempChat {
                    partner: "bob".to_string()
                }
            );
        }
        assert_eq!(parse("/chat"), Command::Usage(Usage::Chat));
        assert_eq!(parse("/chat bob carol"), Command::Usage(Usage::Chat));
    }

    #[test]
    fn test_send_keeps_message_body() {
        for cmd in ["/send", "/message", "/msg", "/dm", "/direct"] {
            assert_eq!(
                parse(&format!("{cmd} bob hello  there | friend")),
                Command::Send {
                    partner: "bob".to_string(),
                    text: "hello  there | friend".to_string()
                }
            );
        }
        assert_eq!(parse("/send bob"), Command::Usage(Usage::Send));
        assert_eq!(parse("/send bob    "), Command::Usage(Usage::Send));
    }

    #[test]
    fn test_listing_commands() {
        for cmd in ["/room", "/rooms", "/chatrooms", "/recent"] {
            assert_eq!(parse(cmd), Command::Rooms);
        }
        for cmd in ["/last", "/history", "/last5"] {
            assert_eq!(
                parse(&format!("{cmd} bob")),
                Command::Last {
                    partner: "bob".to_string()
                }
            );
        }
        assert_eq!(
            parse("/search al"),
            Command::Search {
                prefix: "al".to_string()
            }
        );
        assert_eq!(parse("/search"), Command::Usage(Usage::Search));
    }

    #[test]
    fn test_meta_commands() {
        assert_eq!(parse("/whoami"), Command::WhoAmI);
        assert_eq!(parse("/ping"), Command::Ping);
        assert_eq!(parse("/version"), Command::Version);
        assert_eq!(parse("/about"), Command::About);
        assert_eq!(parse("/help"), Command::Help);
        assert_eq!(parse("/clear"), Command::Clear);
        assert_eq!(parse("/exit"), Command::Exit);
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(parse("   "), Command::Empty);
        assert_eq!(parse("/dance now"), Command::Unknown("/dance".to_string()));
        assert_eq!(parse("hello"), Command::Unknown("hello".to_string()));
    }

    #[test]
    fn test_login_requirement() {
        assert!(parse("/chat bob").requires_login());
        assert!(parse("/chat").requires_login());
        assert!(parse("/whoami").requires_login());
        assert!(!parse("/register").requires_login());
        assert!(!parse("/ping").requires_login());
        assert!(!parse("/help").requires_login());
        assert!(!parse("/exit").requires_login());
    }
}
