//! Dirty-flag register shared by every manager that can request a frame.
//!
//! A [`RedrawFlag`] accumulates the *first* reason it was marked with until it is consumed.
//! Consumers read it exactly once per tick with [`RedrawFlag::check`]; passing `clear = true`
//! hands the reason out and resets the register in the same operation.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

/// Opaque marker describing why a frame must be rendered again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedrawReason(Cow<'static, str>);

impl RedrawReason {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for RedrawReason {
    fn from(value: &'static str) -> Self {
        RedrawReason(Cow::Borrowed(value))
    }
}

impl From<String> for RedrawReason {
    fn from(value: String) -> Self {
        RedrawReason(Cow::Owned(value))
    }
}

impl Display for RedrawReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct RedrawFlag {
    reason: Option<RedrawReason>,
}

impl RedrawFlag {
    /// Creates a register that is already marked, e.g. for the very first frame.
    pub fn marked(reason: impl Into<RedrawReason>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Marks the register. An earlier, unconsumed reason wins.
    pub fn mark(&mut self, reason: impl Into<RedrawReason>) {
        if self.reason.is_none() {
            self.reason = Some(reason.into());
        }
    }

    pub fn is_set(&self) -> bool {
        self.reason.is_some()
    }

    pub fn peek(&self) -> Option<&RedrawReason> {
        self.reason.as_ref()
    }

    pub fn consume(&mut self) -> Option<RedrawReason> {
        self.reason.take()
    }

    pub fn check(&mut self, clear: bool) -> Option<RedrawReason> {
        if clear {
            self.consume()
        } else {
            self.reason.clone()
        }
    }
}
