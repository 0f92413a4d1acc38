//! P2P wire protocol and node: framing, per-peer rate limiting, the
//! per-peer sync state machine, and the dispatcher that owns the peer set.
//!
//! Consensus and storage stay entirely in `fractalpow-core`; this crate
//! only moves bytes between peers and the chain actor's [`ChainHandle`].

pub mod node;
pub mod peer;
pub mod protocol;
pub mod ratelimit;

pub use node::Node;
pub use protocol::Message;
