// In: src/store/mod.rs

//! The data-staging layer: channel identities and the keyed batch store.

pub mod batch_store;
pub mod key;

pub use batch_store::BatchStore;
pub use key::{ChannelKey, DescriptorKind, FlightDescriptor, Ticket};

/// Well-known channel names shared by the remote caller and the session.
pub mod channel {
    /// Session setup values: `[log_dir, log_level]`.
    pub const CONF: &str = "conf";
    /// Positional arguments forwarded to the operator's `open`.
    pub const ARGS: &str = "args";
    /// Input batch for a single compute call.
    pub const TO_PYTHON: &str = "toPython";
    /// Output batch from a compute or input-exhausted drain.
    pub const FROM_PYTHON: &str = "fromPython";
}
