//! Request classification against the per-action schema table.
//!
//! [`classify`] is pure: it looks at a decoded JSON object and either
//! produces a typed [`Message`] or says why it can't. Required fields are
//! checked against [`SCHEMA`] first so that every missing or mistyped field
//! is reported the same way, before serde ever sees the object.

use serde_json::{Map, Value};

use crate::{Action, Message, SchemaError};

/// What a required field must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// Any JSON number.
    Number,
    /// Any JSON string, possibly empty.
    Text,
    /// A non-blank JSON string (account names).
    Name,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::Text => value.is_string(),
            FieldKind::Name => value
                .as_str()
                .is_some_and(|s| !s.trim().is_empty()),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldKind::Number => "a number",
            FieldKind::Text => "a string",
            FieldKind::Name => "a non-empty account name",
        }
    }
}

/// One required field. Any of `paths` satisfies it (aliases).
struct FieldRule {
    paths: &'static [&'static [&'static str]],
    kind: FieldKind,
}

const fn field(
    paths: &'static [&'static [&'static str]],
    kind: FieldKind,
) -> FieldRule {
    FieldRule { paths, kind }
}

const TIME: FieldRule = field(&[&["time"]], FieldKind::Number);

/// Required fields per action tag.
const SCHEMA: &[(Action, &[FieldRule])] = &[
    (
        Action::Presence,
        &[TIME, field(&[&["user", "account_name"]], FieldKind::Name)],
    ),
    (
        Action::Chat,
        &[
            TIME,
            field(&[&["from"]], FieldKind::Name),
            field(&[&["to"]], FieldKind::Name),
            field(&[&["message"]], FieldKind::Text),
        ],
    ),
    (
        Action::Exit,
        &[TIME, field(&[&["from"], &["account_name"]], FieldKind::Name)],
    ),
    (
        Action::GetContacts,
        &[TIME, field(&[&["user"]], FieldKind::Name)],
    ),
    (
        Action::UsersRequest,
        &[TIME, field(&[&["account_name"]], FieldKind::Name)],
    ),
    (
        Action::AddContact,
        &[
            TIME,
            field(&[&["user"]], FieldKind::Name),
            field(&[&["contact"]], FieldKind::Name),
        ],
    ),
    (
        Action::DelContact,
        &[
            TIME,
            field(&[&["user"]], FieldKind::Name),
            field(&[&["contact"]], FieldKind::Name),
        ],
    ),
];

fn rules_for(action: Action) -> &'static [FieldRule] {
    SCHEMA
        .iter()
        .find(|(a, _)| *a == action)
        .map(|(_, rules)| *rules)
        .unwrap_or(&[])
}

fn lookup<'a>(obj: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(obj.get(*first)?, |value, key| value.get(*key))
}

fn check(obj: &Map<String, Value>, rule: &FieldRule) -> Result<(), SchemaError> {
    let mut present: Option<&[&str]> = None;
    for path in rule.paths.iter().copied() {
        if let Some(value) = lookup(obj, path) {
            if rule.kind.accepts(value) {
                return Ok(());
            }
            present.get_or_insert(path);
        }
    }
    let name = |path: &[&str]| path.join(".");
    Err(SchemaError::BadRequest(match present {
        Some(path) => format!("field `{}` must be {}", name(path), rule.kind.describe()),
        None => format!("missing field `{}`", name(rule.paths[0])),
    }))
}

/// Classifies a decoded object as one of the protocol messages.
///
/// # Errors
/// [`SchemaError::BadRequest`] if the `action` tag is missing or unknown,
/// or if any field the action requires is missing or has the wrong type.
pub fn classify(obj: &Map<String, Value>) -> Result<Message, SchemaError> {
    let tag = match obj.get("action") {
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(SchemaError::BadRequest("`action` must be a string".into()));
        }
        None => return Err(SchemaError::BadRequest("missing field `action`".into())),
    };
    let action: Action = tag.parse()?;

    for rule in rules_for(action) {
        check(obj, rule)?;
    }

    let mut obj = obj.clone();
    if action == Action::Exit {
        resolve_exit_alias(&mut obj)?;
    }
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| SchemaError::BadRequest(e.to_string()))
}

/// An exit may carry `from`, `account_name`, or both when they agree.
/// serde only takes one, so a matching alias is dropped here.
fn resolve_exit_alias(obj: &mut Map<String, Value>) -> Result<(), SchemaError> {
    if let (Some(from), Some(alias)) = (obj.get("from"), obj.get("account_name")) {
        if from != alias {
            return Err(SchemaError::BadRequest(
                "`from` and `account_name` name different accounts".into(),
            ));
        }
        obj.remove("account_name");
    }
    Ok(())
}
