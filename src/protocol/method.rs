//! Well-known pub/sub subscription methods.
//!
//! The pool accepts any method name; this enum only names the ones the
//! standard and enhanced node interfaces expose.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============================================================================
// SubscriptionMethod
// ============================================================================

/// A subscription method exposed by the node's pub/sub interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionMethod {
    /// `accountSubscribe`
    AccountSubscribe,
    /// `blockSubscribe`
    BlockSubscribe,
    /// `logsSubscribe`
    LogsSubscribe,
    /// `programSubscribe`
    ProgramSubscribe,
    /// `rootSubscribe`
    RootSubscribe,
    /// `signatureSubscribe`
    SignatureSubscribe,
    /// `slotSubscribe`
    SlotSubscribe,
    /// `slotsUpdatesSubscribe`
    SlotsUpdatesSubscribe,
    /// `voteSubscribe`
    VoteSubscribe,
    /// `transactionSubscribe` (enhanced endpoints only)
    TransactionSubscribe,
}

impl SubscriptionMethod {
    /// All known methods.
    pub const ALL: [Self; 10] = [
        Self::AccountSubscribe,
        Self::BlockSubscribe,
        Self::LogsSubscribe,
        Self::ProgramSubscribe,
        Self::RootSubscribe,
        Self::SignatureSubscribe,
        Self::SlotSubscribe,
        Self::SlotsUpdatesSubscribe,
        Self::VoteSubscribe,
        Self::TransactionSubscribe,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountSubscribe => "accountSubscribe",
            Self::BlockSubscribe => "blockSubscribe",
            Self::LogsSubscribe => "logsSubscribe",
            Self::ProgramSubscribe => "programSubscribe",
            Self::RootSubscribe => "rootSubscribe",
            Self::SignatureSubscribe => "signatureSubscribe",
            Self::SlotSubscribe => "slotSubscribe",
            Self::SlotsUpdatesSubscribe => "slotsUpdatesSubscribe",
            Self::VoteSubscribe => "voteSubscribe",
            Self::TransactionSubscribe => "transactionSubscribe",
        }
    }

    /// Name of the notification method the endpoint pushes for this subscription.
    #[must_use]
    pub fn notification_method(self) -> String {
        self.as_str().replace("Subscribe", "Notification")
    }
}

impl fmt::Display for SubscriptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| Error::config(format!("Unknown subscription method: {s}")))
    }
}

impl From<SubscriptionMethod> for String {
    #[inline]
    fn from(method: SubscriptionMethod) -> Self {
        method.as_str().to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
