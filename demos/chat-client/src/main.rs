//! Console client for a Murmur server.
//!
//! ```text
//! murmur-client -n alice -a 127.0.0.1 -p 7777
//! ```
//!
//! After connecting it announces presence, fetches the account list and
//! the contact list, then reads commands from stdin:
//!
//! ```text
//! bob: hello there      send "hello there" to bob
//! /add bob              add bob to contacts
//! /del bob              remove bob from contacts
//! /contacts             show contacts
//! /users                show every known account
//! /help                 show this list
//! /exit                 leave
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::Parser;
use murmur::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_DELAY: Duration = Duration::from_secs(1);

const HELP: &str = "\
commands:
  <name>: <text>   send a message
  /add <name>      add a contact
  /del <name>      remove a contact
  /contacts        show contacts
  /users           show every known account
  /help            show this list
  /exit            leave";

/// Console client for a Murmur chat relay.
#[derive(Parser)]
#[command(name = "murmur-client", version, about)]
struct Cli {
    /// Server address.
    #[arg(short = 'a', long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    address: IpAddr,

    /// Server port.
    #[arg(short, long, default_value_t = 7777)]
    port: u16,

    /// Account name. Asked for interactively when omitted.
    #[arg(short, long)]
    name: Option<String>,
}

/// What one line of input asks for.
#[derive(Debug, PartialEq)]
enum Command {
    /// Send this request and keep going.
    Send(Message),
    /// Send this request, then wait for the server to close.
    Quit(Message),
    Help,
    Nothing,
}

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
        .into()
}

/// Turns one input line into a command for account `me`.
fn parse_line(me: &AccountName, line: &str, time: Timestamp) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Nothing);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (cmd, arg) = match rest.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (rest, ""),
        };
        let user = me.clone();
        let contact = || {
            if arg.is_empty() {
                Err(format!("usage: /{cmd} <name>"))
            } else {
                Ok(AccountName::from(arg))
            }
        };
        return match cmd {
            "add" => Ok(Command::Send(Message::ContactAdd {
                time,
                user,
                contact: contact()?,
            })),
            "del" => Ok(Command::Send(Message::ContactRemove {
                time,
                user,
                contact: contact()?,
            })),
            "contacts" => Ok(Command::Send(Message::ContactsRequest { time, user })),
            "users" => Ok(Command::Send(Message::UsersRequest {
                time,
                account_name: user,
            })),
            "exit" | "quit" => Ok(Command::Quit(Message::Exit { time, from: user })),
            "help" => Ok(Command::Help),
            other => Err(format!("unknown command /{other}, try /help")),
        };
    }

    match line.split_once(':') {
        Some((to, text)) if !to.trim().is_empty() => Ok(Command::Send(Message::Chat(
            ChatMessage {
                time,
                from: me.clone(),
                to: AccountName::from(to.trim()),
                message: text.trim_start().to_owned(),
            },
        ))),
        _ => Err("expected `<name>: <text>` or a /command, try /help".into()),
    }
}

/// Renders a frame from the server for the console.
fn render(frame: &ServerFrame) -> String {
    match frame {
        ServerFrame::Message(Message::Chat(chat)) => format!("{}: {}", chat.from, chat.message),
        ServerFrame::Message(other) => format!("(unexpected {} from server)", other.action()),
        ServerFrame::Response(resp) => match resp {
            Response::Ack { alert } | Response::Notice { alert } => alert.clone(),
            Response::Welcome { greeting } => greeting.clone(),
            Response::ContactList { names } if names.is_empty() => "(none)".to_owned(),
            Response::ContactList { names } => names
                .iter()
                .map(AccountName::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            Response::Rejected { reason } => format!("error: {reason}"),
            Response::Unreachable { reason } => format!("not delivered: {reason}"),
            Response::ExitAck => "bye".to_owned(),
        },
    }
}

/// Prints frames until the server closes the connection or acks an exit.
async fn print_incoming<R: FrameReader>(mut reader: R) {
    loop {
        match reader.recv().await {
            Ok(Some(bytes)) => match JsonCodec.decode_server_frame(&bytes) {
                Ok(frame) => {
                    println!("{}", render(&frame));
                    if frame == ServerFrame::Response(Response::ExitAck) {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "unreadable frame from server"),
            },
            Ok(None) => {
                println!("server closed the connection");
                return;
            }
            Err(e) => {
                println!("connection lost: {e}");
                return;
            }
        }
    }
}

async fn send<W: FrameWriter>(writer: &mut W, message: &Message) -> anyhow::Result<()> {
    let bytes = JsonCodec.encode(message)?;
    writer.send(&bytes).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let name = match cli.name {
        Some(name) => name,
        None => {
            println!("your name:");
            lines
                .next_line()
                .await?
                .context("stdin closed before a name was given")?
        }
    };
    let me = AccountName::from(name.trim());
    if me.as_str().is_empty() {
        bail!("the account name must not be empty");
    }

    let addr = SocketAddr::new(cli.address, cli.port);
    let transport = TcpClientTransport::connect_with_retry(
        addr,
        DEFAULT_MAX_FRAME_LEN,
        CONNECT_ATTEMPTS,
        CONNECT_DELAY,
    )
    .await
    .with_context(|| format!("could not reach {addr}"))?;
    let (mut reader, mut writer) = transport.into_split();

    // Handshake: the reply decides whether we continue.
    send(
        &mut writer,
        &Message::Presence {
            time: now(),
            user: User {
                account_name: me.clone(),
            },
        },
    )
    .await?;
    let reply = reader
        .recv()
        .await?
        .context("server closed the connection during presence")?;
    match JsonCodec.decode_server_frame(&reply)? {
        ServerFrame::Response(Response::Ack { alert }) => println!("{alert}"),
        other => bail!("presence refused: {}", render(&other)),
    }

    let incoming = tokio::spawn(print_incoming(reader));

    for startup in ["/users", "/contacts"] {
        if let Ok(Command::Send(msg)) = parse_line(&me, startup, now()) {
            send(&mut writer, &msg).await?;
        }
    }
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        if incoming.is_finished() {
            break;
        }
        match parse_line(&me, &line, now()) {
            Ok(Command::Send(msg)) => send(&mut writer, &msg).await?,
            Ok(Command::Quit(msg)) => {
                send(&mut writer, &msg).await?;
                break;
            }
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Nothing) => {}
            Err(e) => println!("{e}"),
        }
    }

    if tokio::time::timeout(Duration::from_secs(2), incoming)
        .await
        .is_err()
    {
        tracing::debug!("server did not close in time");
    }
    let _ = writer.close().await;
    Ok(())
}
