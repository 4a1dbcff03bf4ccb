//! Composite fingerprint keys for the async result cache.
//!
//! A key is an operation name plus an ordered sequence of argument values.
//! Two keys built independently from structurally-equal arguments compare
//! equal — lookup never depends on allocation identity, so a caller that
//! rebuilds its arguments from freshly-decoded data still hits the cache.
//!
//! Keys are ephemeral: rebuilt per call, never serialized.

use crate::shared::PubkeyStr;
use rust_decimal::Decimal;
use std::fmt;

/// One argument slot in a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyArg {
    Str(String),
    U64(u64),
    I64(i64),
    Bool(bool),
    Decimal(Decimal),
    Address(PubkeyStr),
    /// Explicit "no value" marker — distinct from omitting the slot, so
    /// `("open_orders", market, absent)` and `("open_orders", market)` are
    /// different keys.
    Absent,
}

impl From<&str> for KeyArg {
    fn from(s: &str) -> Self {
        KeyArg::Str(s.to_string())
    }
}

impl From<String> for KeyArg {
    fn from(s: String) -> Self {
        KeyArg::Str(s)
    }
}

impl From<u64> for KeyArg {
    fn from(v: u64) -> Self {
        KeyArg::U64(v)
    }
}

impl From<i64> for KeyArg {
    fn from(v: i64) -> Self {
        KeyArg::I64(v)
    }
}

impl From<bool> for KeyArg {
    fn from(v: bool) -> Self {
        KeyArg::Bool(v)
    }
}

impl From<Decimal> for KeyArg {
    fn from(v: Decimal) -> Self {
        KeyArg::Decimal(v)
    }
}

impl From<PubkeyStr> for KeyArg {
    fn from(pk: PubkeyStr) -> Self {
        KeyArg::Address(pk)
    }
}

impl From<&PubkeyStr> for KeyArg {
    fn from(pk: &PubkeyStr) -> Self {
        KeyArg::Address(pk.clone())
    }
}

impl<T: Into<KeyArg>> From<Option<T>> for KeyArg {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => KeyArg::Absent,
        }
    }
}

impl fmt::Display for KeyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyArg::Str(s) => write!(f, "{}", s),
            KeyArg::U64(v) => write!(f, "{}", v),
            KeyArg::I64(v) => write!(f, "{}", v),
            KeyArg::Bool(v) => write!(f, "{}", v),
            KeyArg::Decimal(v) => write!(f, "{}", v),
            KeyArg::Address(pk) => write!(f, "{}", pk),
            KeyArg::Absent => write!(f, "absent"),
        }
    }
}

/// Fingerprint identifying one cached computation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    op: &'static str,
    args: Vec<KeyArg>,
}

impl CacheKey {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            args: Vec::new(),
        }
    }

    /// Append one argument value.
    pub fn with(mut self, arg: impl Into<KeyArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn op(&self) -> &'static str {
        self.op
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
