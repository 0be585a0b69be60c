//! This file is the root of the `udf_bridge` Rust crate.
//!
//! The crate is the session core of a cross-process user-function bridge. A remote
//! caller stages Arrow batches into named channels, then drives a user-supplied
//! row operator through its lifecycle with named actions:
//!
//! 1.  `store` keeps the most recent batch per channel key.
//! 2.  `marshal` turns batches into ordered rows and rows back into batches.
//! 3.  `udf` wraps the user's operator behind the lifecycle adapter.
//! 4.  `session` is the action state machine that ties the three together.
//! 5.  `shutdown` and `server` own the serve loop and the deferred termination path.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod config;
pub mod error;
pub mod logging;
pub mod marshal;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod store;
pub mod udf;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::{BootstrapArgs, ServerConfig, SessionLogConfig};
pub use error::{BridgeError, Result};
pub use marshal::{from_rows, to_rows, Row, ScalarValue};
pub use server::{LocalClient, UdfServer};
pub use session::{Action, ActionDispatcher, ComputeStatus, LifecycleState};
pub use shutdown::{ShutdownController, ShutdownListener};
pub use store::{BatchStore, ChannelKey, FlightDescriptor, Ticket};
pub use udf::{LifecycleAdapter, UdfDefinition, UdfOperator};
