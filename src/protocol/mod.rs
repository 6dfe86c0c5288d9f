//! Wire and socket message types.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `SubscribeRequest` | Local → Endpoint | JSON-RPC subscribe / resubscribe |
//! | raw frame | Endpoint → Local | Acks, errors, notifications (unparsed) |
//! | `SocketEvent` | Transport → Monitor | Socket lifecycle and inbound frames |
//!
//! Inbound frames are never interpreted here; handlers registered on the
//! pool receive the raw bytes.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Typed socket events |
//! | `method` | Well-known subscription method names |
//! | `request` | Subscribe request envelope |

// ============================================================================
// Submodules
// ============================================================================

/// Socket event types.
pub mod event;

/// Well-known subscription methods.
pub mod method;

/// Subscribe request envelope.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{ABNORMAL_CLOSURE, SocketEvent};
pub use method::SubscriptionMethod;
pub use request::{JSONRPC_VERSION, SubscribeRequest};
