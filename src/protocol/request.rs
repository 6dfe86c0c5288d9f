//! Outbound subscribe request envelope.
//!
//! Every subscribe and resubscribe is a single JSON-RPC 2.0 text frame.
//! The `params` array is opaque to the pool and forwarded verbatim.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::subscription::SubscriptionRecord;

// ============================================================================
// Constants
// ============================================================================

/// JSON-RPC protocol version sent on every request.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// SubscribeRequest
// ============================================================================

/// A subscribe request from the pool to the endpoint.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "id": 7,
///   "method": "logsSubscribe",
///   "params": [ ... ]
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest<'a> {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,

    /// Request identifier, echoed by the endpoint in its acknowledgement.
    pub id: SubscriptionId,

    /// Subscription method name.
    pub method: &'a str,

    /// Method parameters.
    pub params: &'a [Value],
}

impl<'a> SubscribeRequest<'a> {
    /// Creates a request envelope.
    #[inline]
    #[must_use]
    pub fn new(id: SubscriptionId, method: &'a str, params: &'a [Value]) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }

    /// Creates the replay envelope for a tracked subscription.
    ///
    /// The record's identifier, method and params are reused unchanged.
    #[inline]
    #[must_use]
    pub fn from_record(record: &'a SubscriptionRecord) -> Self {
        Self::new(record.id, &record.method, &record.params)
    }

    /// Serializes the envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if a param fails to serialize.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
