// In: src/server/transport.rs

//! The in-process request channel between callers and the serve loop.
//!
//! Every request carries its own reply `Sender`; the serve loop answers exactly once
//! per request. `LocalClient` turns that round trip into plain blocking calls.

use arrow::record_batch::RecordBatch;
use crossbeam_channel::{bounded, Sender};

use crate::error::{BridgeError, Result};
use crate::server::FlightInfo;
use crate::session::ActionResult;
use crate::store::{ChannelKey, FlightDescriptor, Ticket};

/// A named control action and its opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action_type: String,
    pub body: Vec<u8>,
}

impl ActionRequest {
    pub fn new(action_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            action_type: action_type.into(),
            body: body.into(),
        }
    }
}

/// One-shot reply slot for a request.
pub type Reply<T> = Sender<Result<T>>;

#[derive(Debug)]
pub enum Request {
    Put {
        descriptor: FlightDescriptor,
        batch: RecordBatch,
        reply: Reply<()>,
    },
    Get {
        ticket: Ticket,
        reply: Reply<RecordBatch>,
    },
    Action {
        action: ActionRequest,
        reply: Reply<Vec<ActionResult>>,
    },
    ListFlights {
        reply: Reply<Vec<FlightInfo>>,
    },
    FlightInfo {
        descriptor: FlightDescriptor,
        reply: Reply<FlightInfo>,
    },
}

/// Caller-side handle onto a running serve loop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalClient {
    requests: Sender<Request>,
}

impl LocalClient {
    pub fn new(requests: Sender<Request>) -> Self {
        Self { requests }
    }

    pub fn put(&self, descriptor: FlightDescriptor, batch: RecordBatch) -> Result<()> {
        self.call(|reply| Request::Put {
            descriptor,
            batch,
            reply,
        })
    }

    /// Stages a batch under a well-known channel such as `toPython`.
    pub fn put_channel(&self, channel: &str, batch: RecordBatch) -> Result<()> {
        self.put(FlightDescriptor::for_path(channel), batch)
    }

    pub fn get(&self, ticket: Ticket) -> Result<RecordBatch> {
        self.call(|reply| Request::Get { ticket, reply })
    }

    pub fn get_channel(&self, channel: &str) -> Result<RecordBatch> {
        self.get(Ticket::for_key(&ChannelKey::for_channel(channel))?)
    }

    pub fn action(&self, action_type: &str, body: &[u8]) -> Result<Vec<ActionResult>> {
        let action = ActionRequest::new(action_type, body);
        self.call(|reply| Request::Action { action, reply })
    }

    pub fn list_flights(&self) -> Result<Vec<FlightInfo>> {
        self.call(|reply| Request::ListFlights { reply })
    }

    pub fn flight_info(&self, descriptor: FlightDescriptor) -> Result<FlightInfo> {
        self.call(|reply| Request::FlightInfo { descriptor, reply })
    }

    fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(build(reply_tx))
            .map_err(|_| BridgeError::Transport("server is no longer accepting requests".into()))?;
        reply_rx
            .recv()
            .map_err(|_| BridgeError::Transport("server dropped the request without replying".into()))?
    }
}
