// In: src/server/mod.rs

//! The flight-facing surface of the bridge.
//!
//! `UdfServer` owns the session and answers the five flight endpoints. `serve` pulls
//! requests off a channel one at a time, which is what serializes action dispatch.
//! The loop leaves when the shutdown signal fires (or every client is gone), reports
//! its last reply as flushed, and then waits for the shutdown thread to finish.

pub mod transport;

pub use transport::{ActionRequest, LocalClient, Reply, Request};

use std::thread::{self, JoinHandle};

use arrow::datatypes::SchemaRef;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use crossbeam_channel::{select, unbounded, Receiver};

use crate::config::ServerConfig;
use crate::error::{BridgeError, Result};
use crate::logging::{self, LogSink};
use crate::session::{ActionDispatcher, ActionResult, LifecycleState};
use crate::shutdown::{ShutdownController, ShutdownListener};
use crate::store::{ChannelKey, FlightDescriptor, Ticket};
use crate::udf::{LifecycleAdapter, UdfDefinition};

/// Everything a caller can learn about one staged flight without fetching it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightInfo {
    pub descriptor: FlightDescriptor,
    pub schema: SchemaRef,
    pub total_records: usize,
    /// Size of the batch as an Arrow IPC stream.
    pub total_bytes: usize,
    pub ticket: Ticket,
}

impl FlightInfo {
    fn describe(key: &ChannelKey, batch: &RecordBatch) -> Result<Self> {
        Ok(Self {
            descriptor: key.descriptor(),
            schema: batch.schema(),
            total_records: batch.num_rows(),
            total_bytes: ipc_stream_size(batch)?,
            ticket: Ticket::for_key(key)?,
        })
    }
}

fn ipc_stream_size(batch: &RecordBatch) -> Result<usize> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema())?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buffer.len())
}

pub struct UdfServer {
    dispatcher: ActionDispatcher,
    listener: ShutdownListener,
    config: ServerConfig,
}

impl UdfServer {
    pub fn new(
        definition: UdfDefinition,
        config: ServerConfig,
        log_sink: Box<dyn LogSink>,
        shutdown: (ShutdownController, ShutdownListener),
    ) -> Self {
        let (controller, listener) = shutdown;
        let adapter = LifecycleAdapter::new(definition);

        Self {
            dispatcher: ActionDispatcher::new(adapter, log_sink, controller),
            listener,
            config,
        }
    }

    /// Production wiring: installs the process logger and exits the process on
    /// `terminate`.
    pub fn bootstrap(definition: UdfDefinition, config: ServerConfig) -> Result<Self> {
        let sink = logging::init(&config)?;
        let server = Self::new(
            definition,
            config,
            Box::new(sink),
            ShutdownController::exiting_process(),
        );
        log::info!("Flight Server is up and running at {}", server.location());
        Ok(server)
    }

    pub fn location(&self) -> String {
        self.config.location()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.dispatcher.state()
    }

    //==============================================================================
    // Flight Endpoints
    //==============================================================================

    pub fn do_put(&mut self, descriptor: &FlightDescriptor, batch: RecordBatch) -> Result<()> {
        let key = ChannelKey::from_descriptor(descriptor);
        log::debug!("do_put {} ({} rows)", key, batch.num_rows());
        self.dispatcher.store_mut().put(key, batch);
        Ok(())
    }

    /// Fails with `NotFound` when nothing is staged under the ticket's key.
    pub fn do_get(&self, ticket: &Ticket) -> Result<RecordBatch> {
        let key = ticket.key()?;
        log::debug!("do_get {}", key);
        self.dispatcher.store().get(&key)
    }

    pub fn do_action(&mut self, action: &ActionRequest) -> Result<Vec<ActionResult>> {
        self.dispatcher.dispatch(&action.action_type, &action.body)
    }

    pub fn list_flights(&self) -> Result<Vec<FlightInfo>> {
        self.dispatcher
            .store()
            .iter()
            .map(|(key, batch)| FlightInfo::describe(key, batch))
            .collect()
    }

    pub fn get_flight_info(&self, descriptor: &FlightDescriptor) -> Result<FlightInfo> {
        let key = ChannelKey::from_descriptor(descriptor);
        let batch = self.dispatcher.store().get(&key)?;
        FlightInfo::describe(&key, &batch)
    }

    //==============================================================================
    // Serve Loop
    //==============================================================================

    /// Runs one request to completion and sends its reply.
    pub fn handle(&mut self, request: Request) {
        let delivered = match request {
            Request::Put {
                descriptor,
                batch,
                reply,
            } => reply.send(self.do_put(&descriptor, batch)).is_ok(),
            Request::Get { ticket, reply } => reply.send(self.do_get(&ticket)).is_ok(),
            Request::Action { action, reply } => {
                let result = self.do_action(&action);
                if let Err(e) = &result {
                    log::warn!("action {:?} failed: {}", action.action_type, e);
                }
                reply.send(result).is_ok()
            }
            Request::ListFlights { reply } => reply.send(self.list_flights()).is_ok(),
            Request::FlightInfo { descriptor, reply } => {
                reply.send(self.get_flight_info(&descriptor)).is_ok()
            }
        };
        if !delivered {
            log::debug!("caller went away before its reply was delivered");
        }
    }

    /// Serves requests until shutdown is signalled or every client has disconnected.
    pub fn serve(mut self, requests: Receiver<Request>) -> Result<()> {
        log::info!("serving at {}", self.location());
        let signal = self.listener.signal().clone();

        loop {
            select! {
                recv(requests) -> request => match request {
                    Ok(request) => self.handle(request),
                    Err(_) => {
                        log::info!("all clients disconnected, leaving serve loop");
                        break;
                    }
                },
                recv(signal) -> _ => {
                    log::info!("shutdown signalled, leaving serve loop");
                    break;
                }
            }

            // The terminate reply is already out; take nothing after it.
            if self.dispatcher.state() == LifecycleState::Terminated {
                log::info!("session terminated, leaving serve loop");
                break;
            }
        }

        self.listener.acknowledge_flushed();
        self.dispatcher.shutdown_mut().wait()
    }

    /// Runs `serve` on a dedicated thread and hands back a client connected to it.
    pub fn spawn(self) -> Result<(LocalClient, JoinHandle<Result<()>>)> {
        let (requests_tx, requests_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("udf-bridge-serve".into())
            .spawn(move || self.serve(requests_rx))
            .map_err(|e| BridgeError::Transport(format!("failed to spawn serve thread: {}", e)))?;
        Ok((LocalClient::new(requests_tx), handle))
    }
}

impl std::fmt::Debug for UdfServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdfServer")
            .field("location", &self.location())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests;
