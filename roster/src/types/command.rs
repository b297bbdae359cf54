use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::staff::{StaffFields, StaffId};

/// A queued mutation of the staff store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Creates a record. Every field must be present when the command is applied.
    Insert { fields: StaffFields },
    /// Overwrites the fields present in `fields` on an existing record.
    Update {
        record_id: StaffId,
        fields: StaffFields,
    },
    /// Removes a record. Removing a missing record is a no-op.
    Delete { record_id: StaffId },
}

impl Command {
    pub fn action(&self) -> CommandAction {
        match self {
            Command::Insert { .. } => CommandAction::Insert,
            Command::Update { .. } => CommandAction::Update,
            Command::Delete { .. } => CommandAction::Delete,
        }
    }

    pub fn record_id(&self) -> Option<StaffId> {
        match self {
            Command::Insert { .. } => None,
            Command::Update { record_id, .. } | Command::Delete { record_id } => Some(*record_id),
        }
    }

    pub fn fields(&self) -> Option<&StaffFields> {
        match self {
            Command::Insert { fields } | Command::Update { fields, .. } => Some(fields),
            Command::Delete { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandAction {
    Insert,
    Update,
    Delete,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Insert => "insert",
            CommandAction::Update => "update",
            CommandAction::Delete => "delete",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-assigned handle of a delivered command, used to acknowledge or release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(i64);

impl DeliveryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command handed to a consumer, together with how often it failed before.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: DeliveryId,
    pub command: Command,
    pub attempts: u32,
}
