//! Core protocol types for Murmur's wire format.
//!
//! Every type here travels on the wire as one JSON object per line. Client
//! requests are [`Message`]s, internally tagged by their `action` field.
//! Server replies are [`Response`]s, which carry an HTTP-style `response`
//! code instead of an action (except the exit acknowledgement, which echoes
//! the `exit` action back).

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchemaError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The display name a client registers with.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
/// `Borrow<str>` lets maps keyed by `AccountName` be queried with `&str`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    /// Wraps a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AccountName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// A sender-supplied timestamp, kept as the JSON number it arrived as.
///
/// Integers stay integers on the way back out, so `7` is written as `7`
/// rather than `7.0`, and integer values beyond 2^53 keep every digit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(serde_json::Number);

impl Timestamp {
    /// The timestamp in seconds, possibly rounded.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// The number exactly as it travels on the wire.
    pub fn as_number(&self) -> &serde_json::Number {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self(secs.into())
    }
}

/// NaN and the infinities have no JSON form and become `0`.
impl From<f64> for Timestamp {
    fn from(secs: f64) -> Self {
        Self(serde_json::Number::from_f64(secs).unwrap_or_else(|| 0u64.into()))
    }
}

impl From<String> for AccountName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The `user` object carried by a presence message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub account_name: AccountName,
}

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// The closed set of `action` tags a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Presence,
    Chat,
    Exit,
    GetContacts,
    AddContact,
    DelContact,
    UsersRequest,
}

impl Action {
    /// Every action, in wire-table order.
    pub const ALL: [Action; 7] = [
        Action::Presence,
        Action::Chat,
        Action::Exit,
        Action::GetContacts,
        Action::AddContact,
        Action::DelContact,
        Action::UsersRequest,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Presence => "presence",
            Action::Chat => "msg",
            Action::Exit => "exit",
            Action::GetContacts => "get_contacts",
            Action::AddContact => "add_contact",
            Action::DelContact => "del_contact",
            Action::UsersRequest => "users_request",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = SchemaError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == tag)
            .ok_or_else(|| {
                SchemaError::BadRequest(format!("unknown action `{tag}`"))
            })
    }
}

// ---------------------------------------------------------------------------
// Message: client → server (and relayed server → client for chat)
// ---------------------------------------------------------------------------

/// A chat line from one account to another.
///
/// Relayed to the recipient exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender-supplied timestamp (seconds since the epoch).
    pub time: Timestamp,
    pub from: AccountName,
    pub to: AccountName,
    /// The text body.
    pub message: String,
}

/// A client request, internally tagged by `action`.
///
/// ```text
/// {"action":"presence","time":1.0,"user":{"account_name":"alice"}}
/// {"action":"msg","time":1.0,"from":"alice","to":"bob","message":"hi"}
/// ```
///
/// Don't deserialize this directly from untrusted input; go through
/// [`classify`](crate::classify) so missing fields come back as a uniform
/// `BadRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Message {
    /// Handshake: claim an account name for this connection.
    #[serde(rename = "presence")]
    Presence { time: Timestamp, user: User },

    /// Directed chat line.
    #[serde(rename = "msg")]
    Chat(ChatMessage),

    /// Leave the chat and close the connection.
    ///
    /// Some clients send the name as `account_name`; either is accepted,
    /// and both may be sent as long as they agree.
    #[serde(rename = "exit")]
    Exit {
        time: Timestamp,
        #[serde(alias = "account_name")]
        from: AccountName,
    },

    /// Fetch the caller's contact list.
    #[serde(rename = "get_contacts")]
    ContactsRequest { time: Timestamp, user: AccountName },

    /// Add `contact` to `user`'s contact list.
    #[serde(rename = "add_contact")]
    ContactAdd {
        time: Timestamp,
        user: AccountName,
        contact: AccountName,
    },

    /// Remove `contact` from `user`'s contact list.
    #[serde(rename = "del_contact")]
    ContactRemove {
        time: Timestamp,
        user: AccountName,
        contact: AccountName,
    },

    /// Fetch every known account.
    #[serde(rename = "users_request")]
    UsersRequest { time: Timestamp, account_name: AccountName },
}

impl Message {
    /// The action tag of this message.
    pub fn action(&self) -> Action {
        match self {
            Message::Presence { .. } => Action::Presence,
            Message::Chat(_) => Action::Chat,
            Message::Exit { .. } => Action::Exit,
            Message::ContactsRequest { .. } => Action::GetContacts,
            Message::ContactAdd { .. } => Action::AddContact,
            Message::ContactRemove { .. } => Action::DelContact,
            Message::UsersRequest { .. } => Action::UsersRequest,
        }
    }

    /// The account this message claims to act for.
    pub fn account(&self) -> &AccountName {
        match self {
            Message::Presence { user, .. } => &user.account_name,
            Message::Chat(chat) => &chat.from,
            Message::Exit { from, .. } => from,
            Message::ContactsRequest { user, .. }
            | Message::ContactAdd { user, .. }
            | Message::ContactRemove { user, .. } => user,
            Message::UsersRequest { account_name, .. } => account_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Response: server → client
// ---------------------------------------------------------------------------

/// A server reply.
///
/// On the wire these are flat objects keyed by a numeric `response` code:
///
/// | variant | wire shape |
/// |---|---|
/// | `Ack`, `Welcome` | `{"response":200,"alert":"..."}` |
/// | `ContactList` | `{"response":202,"alert":["..."]}` |
/// | `Notice` | `{"response":206,"alert":"..."}` |
/// | `Rejected` | `{"response":400,"error":"..."}` |
/// | `Unreachable` | `{"response":406,"error":"..."}` |
/// | `ExitAck` | `{"action":"exit"}` |
///
/// `Ack` and `Welcome` share a shape, so a decoded 200 is always `Ack`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireResponse", try_from = "WireResponse")]
pub enum Response {
    /// Request succeeded.
    Ack { alert: String },
    /// Presence accepted.
    Welcome { greeting: String },
    /// A list of names (contacts or known accounts).
    ContactList { names: Vec<AccountName> },
    /// Informational no-op, e.g. removing a contact that wasn't there.
    Notice { alert: String },
    /// Malformed request or one that is illegal in the current state.
    Rejected { reason: String },
    /// The chat recipient is not online.
    Unreachable { reason: String },
    /// Exit acknowledged; the server closes the connection next.
    ExitAck,
}

impl Response {
    pub const OK: u16 = 200;
    pub const LIST: u16 = 202;
    pub const NOTICE: u16 = 206;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNREACHABLE: u16 = 406;

    /// The numeric code, or `None` for the exit acknowledgement.
    pub fn code(&self) -> Option<u16> {
        match self {
            Response::Ack { .. } | Response::Welcome { .. } => Some(Self::OK),
            Response::ContactList { .. } => Some(Self::LIST),
            Response::Notice { .. } => Some(Self::NOTICE),
            Response::Rejected { .. } => Some(Self::BAD_REQUEST),
            Response::Unreachable { .. } => Some(Self::UNREACHABLE),
            Response::ExitAck => None,
        }
    }

    /// Shorthand for a `Rejected` reply.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Response::Rejected {
            reason: reason.into(),
        }
    }
}

/// The flat wire form `Response` converts through.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alert: Option<Alert>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Alert {
    Text(String),
    Names(Vec<AccountName>),
}

impl From<Response> for WireResponse {
    fn from(resp: Response) -> Self {
        let code = resp.code();
        let mut wire = WireResponse {
            response: code,
            ..WireResponse::default()
        };
        match resp {
            Response::Ack { alert } | Response::Notice { alert } => {
                wire.alert = Some(Alert::Text(alert));
            }
            Response::Welcome { greeting } => {
                wire.alert = Some(Alert::Text(greeting));
            }
            Response::ContactList { names } => {
                wire.alert = Some(Alert::Names(names));
            }
            Response::Rejected { reason } | Response::Unreachable { reason } => {
                wire.error = Some(reason);
            }
            Response::ExitAck => {
                wire.action = Some(Action::Exit.as_str().to_owned());
            }
        }
        wire
    }
}

impl TryFrom<WireResponse> for Response {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let text = |alert: Option<Alert>| match alert {
            Some(Alert::Text(s)) => s,
            _ => String::new(),
        };
        match (wire.response, wire.action.as_deref()) {
            (None, Some("exit")) => Ok(Response::ExitAck),
            (Some(Self::OK), _) => Ok(Response::Ack {
                alert: text(wire.alert),
            }),
            (Some(Self::LIST), _) => match wire.alert {
                Some(Alert::Names(names)) => Ok(Response::ContactList { names }),
                _ => Err("202 response without a name list".into()),
            },
            (Some(Self::NOTICE), _) => Ok(Response::Notice {
                alert: text(wire.alert),
            }),
            (Some(Self::BAD_REQUEST), _) => Ok(Response::Rejected {
                reason: wire.error.unwrap_or_default(),
            }),
            (Some(Self::UNREACHABLE), _) => Ok(Response::Unreachable {
                reason: wire.error.unwrap_or_default(),
            }),
            (Some(code), _) => Err(format!("unknown response code {code}")),
            (None, _) => Err("missing `response` code".into()),
        }
    }
}

/// Anything a client can receive: a server reply or a relayed chat line.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Response(Response),
    Message(Message),
}

// =========================================================================
// Tests
// =========================================================================
