// In: src/session/dispatcher.rs

use arrow::record_batch::RecordBatch;

use crate::config::SessionLogConfig;
use crate::error::{BridgeError, Result};
use crate::logging::LogSink;
use crate::marshal::{self, ScalarValue};
use crate::session::response::{ActionResult, ComputeStatus, HEALTH_CHECK_RESPONSE, SUCCESS_RESPONSE};
use crate::session::{Action, LifecycleState};
use crate::shutdown::ShutdownController;
use crate::store::{channel, BatchStore, ChannelKey};
use crate::udf::LifecycleAdapter;

/// Interprets named control actions against the single session.
///
/// Dispatch is synchronous and sequential; the caller serializes invocations.
/// Only `compute` recovers from failures locally. Every other action propagates
/// its error and leaves the lifecycle state where it was.
pub struct ActionDispatcher {
    store: BatchStore,
    adapter: LifecycleAdapter,
    log_sink: Box<dyn LogSink>,
    shutdown: ShutdownController,
    state: LifecycleState,
}

impl ActionDispatcher {
    pub fn new(
        adapter: LifecycleAdapter,
        log_sink: Box<dyn LogSink>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            store: BatchStore::new(),
            adapter,
            log_sink,
            shutdown,
            state: LifecycleState::Created,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn store(&self) -> &BatchStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BatchStore {
        &mut self.store
    }

    pub fn shutdown_mut(&mut self) -> &mut ShutdownController {
        &mut self.shutdown
    }

    /// The single entry point: resolves `name` and runs the action.
    ///
    /// Unknown names fail with `UnknownAction` whatever the current state.
    pub fn dispatch(&mut self, name: &str, payload: &[u8]) -> Result<Vec<ActionResult>> {
        log::debug!("Flight Server on Action {} ({} byte payload)", name, payload.len());
        let action: Action = name.parse()?;

        match action {
            Action::HealthCheck => Ok(vec![ActionResult::new(HEALTH_CHECK_RESPONSE)]),
            Action::Open => self.open(),
            Action::Compute => self.compute(),
            Action::InputExhausted => self.input_exhausted(),
            Action::Close => self.close(),
            Action::Terminate => self.terminate(),
        }
    }

    //==============================================================================
    // Lifecycle Actions
    //==============================================================================

    fn open(&mut self) -> Result<Vec<ActionResult>> {
        // 1. Both channels must be staged before anything is touched.
        let conf = self.store.get(&ChannelKey::for_channel(channel::CONF))?;
        let args = self.store.get(&ChannelKey::for_channel(channel::ARGS))?;
        self.ensure_permitted(Action::Open)?;

        // 2. Apply the caller's session log configuration.
        let conf_values = scalar_list(&conf, channel::CONF)?;
        let log_config = SessionLogConfig::from_values(&conf_values)?;
        self.log_sink.attach(&log_config)?;

        // 3. Open the user operator with the positional arguments.
        let arg_values = scalar_list(&args, channel::ARGS)?;
        self.adapter.open(&arg_values)?;

        self.state = LifecycleState::Opened;
        Ok(vec![ActionResult::new(SUCCESS_RESPONSE)])
    }

    fn compute(&mut self) -> Result<Vec<ActionResult>> {
        let input_key = ChannelKey::for_channel(channel::TO_PYTHON);

        // A missing input is a protocol error, reported before any mutation.
        let input = self.store.get(&input_key)?;
        if let Err(e) = self.ensure_permitted(Action::Compute) {
            self.store.remove(&input_key);
            return Err(e);
        }

        let outcome = self.process_batch(&input);

        // Discard this batch of input regardless of the outcome.
        self.store.remove(&input_key);

        let status = match outcome {
            Ok(emitted) => {
                log::debug!("compute emitted {} rows", emitted);
                self.state = LifecycleState::Computing;
                ComputeStatus::Success
            }
            Err(e) => {
                log::warn!("compute failed, reporting to caller: {}", e);
                ComputeStatus::fail(&e)
            }
        };

        Ok(vec![ActionResult::new(status.to_bytes()?)])
    }

    fn input_exhausted(&mut self) -> Result<Vec<ActionResult>> {
        self.ensure_permitted(Action::InputExhausted)?;
        self.adapter.input_exhausted()?;
        self.output_data()?;

        self.state = LifecycleState::Exhausted;
        Ok(vec![ActionResult::new(SUCCESS_RESPONSE)])
    }

    fn close(&mut self) -> Result<Vec<ActionResult>> {
        self.ensure_permitted(Action::Close)?;
        self.adapter.close()?;

        self.state = LifecycleState::Closed;
        Ok(vec![ActionResult::new(SUCCESS_RESPONSE)])
    }

    fn terminate(&mut self) -> Result<Vec<ActionResult>> {
        // The actual teardown runs on the shutdown thread so this reply can go out first.
        self.shutdown.request()?;
        self.state = LifecycleState::Terminated;
        Ok(Vec::new())
    }

    //==============================================================================
    // Helpers
    //==============================================================================

    fn ensure_permitted(&self, action: Action) -> Result<()> {
        if self.state.permits(action) {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                action: action.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    /// Feeds every input row to the operator in order, then drains its output.
    fn process_batch(&mut self, input: &RecordBatch) -> Result<usize> {
        let rows = marshal::to_rows(input)?;
        log::debug!("got {} rows in this flight", rows.len());

        for row in rows {
            self.adapter.accept(row)?;
        }
        self.output_data()
    }

    /// Drains the operator and replaces the `fromPython` channel with the result.
    fn output_data(&mut self) -> Result<usize> {
        let rows = self.adapter.drain()?;
        let batch = marshal::from_rows(&rows)?;
        self.store
            .put(ChannelKey::for_channel(channel::FROM_PYTHON), batch);
        Ok(rows.len())
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("state", &self.state)
            .field("staged", &self.store.len())
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

/// Reads a staged batch as a flat list of scalars.
///
/// The column named after the channel is preferred, falling back to the first column.
fn scalar_list(batch: &RecordBatch, column: &str) -> Result<Vec<ScalarValue>> {
    match batch
        .column_by_name(column)
        .or_else(|| batch.columns().first())
    {
        Some(array) => marshal::column_to_scalars(array.as_ref()),
        None => Ok(Vec::new()),
    }
}
