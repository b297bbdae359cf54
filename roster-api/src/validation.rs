//! Request validation shared by the routes.
//!
//! Validation collects every violation instead of stopping at the first one, so a 400 response
//! lists everything the client has to fix.

use uuid::Uuid;

/// Collected validation failures of one request.
#[derive(Debug, Default)]
pub struct Violations {
    messages: Vec<String>,
    prefix: Option<String>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: &str) {
        let message = match &self.prefix {
            Some(prefix) => format!("{prefix}{message}"),
            None => message.to_string(),
        };
        self.messages.push(message);
    }

    pub fn require_text(&mut self, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.push(message);
        }
    }

    pub fn require_positive(&mut self, value: f64, message: &str) {
        if !(value.is_finite() && value > 0.0) {
            self.push(message);
        }
    }

    /// Parses `value` as a UUID, recording `message` when it is not one.
    pub fn require_uuid(&mut self, value: &str, message: &str) -> Option<Uuid> {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(message);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_result(self) -> Result<(), Vec<String>> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(self.messages)
        }
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

/// A request body that can check its own fields.
pub trait Validate {
    fn validate(&self, violations: &mut Violations);
}

/// Validates a non-empty batch, prefixing each violation with the element index.
pub fn validate_batch<T: Validate>(items: &[T], empty_message: &str) -> Result<(), Vec<String>> {
    let mut violations = Violations::new();

    if items.is_empty() {
        violations.push(empty_message);
    }

    for (index, item) in items.iter().enumerate() {
        violations.prefix = Some(format!("[{index}] "));
        item.validate(&mut violations);
    }
    violations.prefix = None;

    violations.into_result()
}
