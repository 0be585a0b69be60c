use super::*;
use crate::config::SessionLogConfig;
use crate::error::{BridgeError, Result, UdfError};
use crate::logging::LogSink;
use crate::marshal::{to_rows, Row, ScalarValue};
use crate::shutdown::{ShutdownController, ShutdownListener};
use crate::store::{channel, ChannelKey};
use crate::udf::{LifecycleAdapter, UdfDefinition, UdfOperator};
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::LevelFilter;
use std::sync::{Arc, Mutex};

type Events = Arc<Mutex<Vec<String>>>;

/// Doubles `x` and emits one row per input. `x == -1` makes it raise.
/// On input exhaustion it emits a single summary row with the number of rows seen.
struct Doubler {
    events: Events,
    pending: Vec<Row>,
    seen: i64,
    fail_close: bool,
}

impl UdfOperator for Doubler {
    fn open(&mut self, args: &[ScalarValue]) -> std::result::Result<(), UdfError> {
        let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.events
            .lock()
            .unwrap()
            .push(format!("opened [{}]", rendered.join(", ")));
        Ok(())
    }

    fn accept(&mut self, row: Row) -> std::result::Result<(), UdfError> {
        let x = row
            .get("x")
            .and_then(ScalarValue::as_i64)
            .ok_or("row has no integer x")?;
        if x == -1 {
            return Err("cannot double -1".into());
        }
        self.seen += 1;
        self.pending.push(Row::new().with("x", x * 2));
        Ok(())
    }

    fn has_next(&mut self) -> std::result::Result<bool, UdfError> {
        Ok(!self.pending.is_empty())
    }

    fn next(&mut self) -> std::result::Result<Row, UdfError> {
        Ok(self.pending.remove(0))
    }

    fn input_exhausted(&mut self) -> std::result::Result<(), UdfError> {
        self.events.lock().unwrap().push("exhausted".into());
        self.pending.push(Row::new().with("seen", self.seen));
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), UdfError> {
        if self.fail_close {
            return Err("close exploded".into());
        }
        self.events.lock().unwrap().push("closed".into());
        Ok(())
    }
}

/// Remembers every session log configuration it was asked to attach.
struct RecordingLogSink(Arc<Mutex<Vec<SessionLogConfig>>>);

impl LogSink for RecordingLogSink {
    fn attach(&self, config: &SessionLogConfig) -> Result<()> {
        self.0.lock().unwrap().push(config.clone());
        Ok(())
    }
}

struct Harness {
    dispatcher: ActionDispatcher,
    listener: ShutdownListener,
    events: Events,
    log_configs: Arc<Mutex<Vec<SessionLogConfig>>>,
}

fn harness_with(fail_close: bool) -> Harness {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let log_configs = Arc::new(Mutex::new(Vec::new()));

    let adapter = LifecycleAdapter::new(UdfDefinition::operator(Doubler {
        events: events.clone(),
        pending: Vec::new(),
        seen: 0,
        fail_close,
    }));
    let exit_events = events.clone();
    let (shutdown, listener) = ShutdownController::new(Box::new(move || {
        exit_events.lock().unwrap().push("exit".into());
    }));

    Harness {
        dispatcher: ActionDispatcher::new(
            adapter,
            Box::new(RecordingLogSink(log_configs.clone())),
            shutdown,
        ),
        listener,
        events,
        log_configs,
    }
}

fn harness() -> Harness {
    harness_with(false)
}

fn string_column(name: &str, values: Vec<&str>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values))]).unwrap()
}

fn x_batch(values: Vec<i64>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
}

fn stage(h: &mut Harness, channel_name: &str, batch: RecordBatch) {
    h.dispatcher
        .store_mut()
        .put(ChannelKey::for_channel(channel_name), batch);
}

fn stage_open_channels(h: &mut Harness) {
    stage(h, channel::CONF, string_column("conf", vec!["/tmp/udf-logs", "DEBUG"]));
    stage(h, channel::ARGS, string_column("args", vec!["alpha", "beta"]));
}

fn open(h: &mut Harness) {
    stage_open_channels(h);
    let response = h.dispatcher.dispatch("open", b"").unwrap();
    assert_eq!(response, vec![ActionResult::new(SUCCESS_RESPONSE)]);
}

fn compute_status(h: &mut Harness) -> ComputeStatus {
    let response = h.dispatcher.dispatch("compute", b"").unwrap();
    assert_eq!(response.len(), 1);
    ComputeStatus::from_bytes(&response[0].body).unwrap()
}

fn from_python_rows(h: &Harness) -> Vec<Row> {
    let batch = h
        .dispatcher
        .store()
        .get(&ChannelKey::for_channel(channel::FROM_PYTHON))
        .unwrap();
    to_rows(&batch).unwrap()
}

fn to_python_staged(h: &Harness) -> bool {
    h.dispatcher
        .store()
        .contains(&ChannelKey::for_channel(channel::TO_PYTHON))
}

//==================================================================================
// Action parsing
//==================================================================================

#[test]
fn test_action_names_roundtrip() {
    for action in Action::ALL {
        assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
    }
    assert!(matches!(
        "Compute".parse::<Action>(),
        Err(BridgeError::UnknownAction(name)) if name == "Compute"
    ));
}

#[test]
fn test_unknown_action_fails_in_every_state() {
    // --- ARRANGE ---
    let mut h = harness();
    let check = |h: &mut Harness| {
        let err = h.dispatcher.dispatch("nonexistent", b"payload").unwrap_err();
        assert!(matches!(err, BridgeError::UnknownAction(ref n) if n == "nonexistent"));
    };

    // --- ACT & ASSERT ---
    check(&mut h);
    open(&mut h);
    check(&mut h);
    h.dispatcher.dispatch("input_exhausted", b"").unwrap();
    check(&mut h);
    h.dispatcher.dispatch("close", b"").unwrap();
    check(&mut h);
    assert_eq!(h.dispatcher.state(), LifecycleState::Closed);
    h.dispatcher.dispatch("terminate", b"").unwrap();
    check(&mut h);
    assert_eq!(h.dispatcher.state(), LifecycleState::Terminated);

    h.listener.acknowledge_flushed();
    h.dispatcher.shutdown_mut().wait().unwrap();
}

#[test]
fn test_health_check_in_any_state() {
    let mut h = harness();
    let response = h.dispatcher.dispatch("health_check", b"").unwrap();
    assert_eq!(response, vec![ActionResult::new(HEALTH_CHECK_RESPONSE)]);
    assert_eq!(h.dispatcher.state(), LifecycleState::Created);
}

//==================================================================================
// open
//==================================================================================

#[test]
fn test_open_forwards_args_and_conf() {
    // --- ARRANGE ---
    let mut h = harness();

    // --- ACT ---
    open(&mut h);

    // --- ASSERT ---
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
    assert_eq!(*h.events.lock().unwrap(), vec![r#"opened ["alpha", "beta"]"#]);

    let configs = h.log_configs.lock().unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].log_dir, std::path::PathBuf::from("/tmp/udf-logs"));
    assert_eq!(configs[0].level, LevelFilter::Debug);
}

#[test]
fn test_open_without_args_is_not_found() {
    let mut h = harness();
    stage(&mut h, channel::CONF, string_column("conf", vec!["/tmp", "INFO"]));

    let err = h.dispatcher.dispatch("open", b"").unwrap_err();

    assert!(matches!(err, BridgeError::NotFound { .. }));
    assert_eq!(h.dispatcher.state(), LifecycleState::Created);
    assert!(h.events.lock().unwrap().is_empty());
    assert!(h.log_configs.lock().unwrap().is_empty());
}

#[test]
fn test_open_twice_is_invalid_state() {
    let mut h = harness();
    open(&mut h);

    let err = h.dispatcher.dispatch("open", b"").unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
}

//==================================================================================
// compute
//==================================================================================

#[test]
fn test_compute_doubles_rows_into_from_python() {
    // --- ARRANGE ---
    let mut h = harness();
    open(&mut h);
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![1, 2]));

    // --- ACT ---
    let status = compute_status(&mut h);

    // --- ASSERT ---
    assert_eq!(status, ComputeStatus::Success);
    assert_eq!(
        from_python_rows(&h),
        vec![Row::new().with("x", 2), Row::new().with("x", 4)]
    );
    assert!(!to_python_staged(&h));
    assert_eq!(h.dispatcher.state(), LifecycleState::Computing);
}

#[test]
fn test_compute_is_reentrant_and_replaces_output() {
    let mut h = harness();
    open(&mut h);

    stage(&mut h, channel::TO_PYTHON, x_batch(vec![1, 2, 3]));
    assert!(compute_status(&mut h).is_success());
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![10]));
    assert!(compute_status(&mut h).is_success());

    assert_eq!(from_python_rows(&h), vec![Row::new().with("x", 20)]);
}

#[test]
fn test_failing_compute_reports_and_discards_input() {
    // --- ARRANGE ---
    let mut h = harness();
    open(&mut h);
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![3, -1]));

    // --- ACT ---
    let status = compute_status(&mut h);

    // --- ASSERT ---
    match status {
        ComputeStatus::Fail { error_message } => {
            assert!(!error_message.is_empty());
            assert!(error_message.contains("cannot double -1"));
        }
        other => panic!("expected a failed status, got {:?}", other),
    }
    assert!(!to_python_staged(&h));
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
}

#[test]
fn test_compute_rejected_row_is_reported() {
    let mut h = harness();
    open(&mut h);
    stage(&mut h, channel::TO_PYTHON, string_column("x", vec!["one"]));

    let status = compute_status(&mut h);

    assert!(!status.is_success());
    assert!(!to_python_staged(&h));
}

#[test]
fn test_compute_with_duplicate_columns_fails_without_losing_data() {
    // --- ARRANGE ---
    let mut h = harness();
    open(&mut h);
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Int64, false),
        Field::new("x", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1])),
            Arc::new(Int64Array::from(vec![2])),
        ],
    )
    .unwrap();
    stage(&mut h, channel::TO_PYTHON, batch);

    // --- ACT ---
    let status = compute_status(&mut h);

    // --- ASSERT ---
    match status {
        ComputeStatus::Fail { error_message } => assert!(error_message.contains("Duplicate")),
        other => panic!("expected a failed status, got {:?}", other),
    }
    assert!(!to_python_staged(&h));
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
}

#[test]
fn test_compute_without_input_is_not_found() {
    let mut h = harness();
    open(&mut h);

    let err = h.dispatcher.dispatch("compute", b"").unwrap_err();

    assert!(matches!(err, BridgeError::NotFound { .. }));
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
    assert!(!h
        .dispatcher
        .store()
        .contains(&ChannelKey::for_channel(channel::FROM_PYTHON)));
}

#[test]
fn test_compute_before_open_is_invalid_and_discards_input() {
    let mut h = harness();
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![1]));

    let err = h.dispatcher.dispatch("compute", b"").unwrap_err();

    assert!(matches!(err, BridgeError::InvalidState { .. }));
    assert!(!to_python_staged(&h));
    assert_eq!(h.dispatcher.state(), LifecycleState::Created);
}

#[test]
fn test_compute_with_empty_output_stores_empty_batch() {
    let mut h = harness();
    open(&mut h);
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![]));

    assert!(compute_status(&mut h).is_success());

    let batch = h
        .dispatcher
        .store()
        .get(&ChannelKey::for_channel(channel::FROM_PYTHON))
        .unwrap();
    assert_eq!(batch.num_rows(), 0);
}

//==================================================================================
// input_exhausted / close / terminate
//==================================================================================

#[test]
fn test_input_exhausted_drains_remaining_output() {
    let mut h = harness();
    open(&mut h);
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![5, 6]));
    compute_status(&mut h);

    let response = h.dispatcher.dispatch("input_exhausted", b"").unwrap();

    assert_eq!(response, vec![ActionResult::new(SUCCESS_RESPONSE)]);
    assert_eq!(from_python_rows(&h), vec![Row::new().with("seen", 2)]);
    assert_eq!(h.dispatcher.state(), LifecycleState::Exhausted);
}

#[test]
fn test_compute_after_input_exhausted_is_invalid() {
    let mut h = harness();
    open(&mut h);
    h.dispatcher.dispatch("input_exhausted", b"").unwrap();
    stage(&mut h, channel::TO_PYTHON, x_batch(vec![1]));

    let err = h.dispatcher.dispatch("compute", b"").unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
}

#[test]
fn test_close_transitions_and_records() {
    let mut h = harness();
    open(&mut h);
    h.dispatcher.dispatch("input_exhausted", b"").unwrap();

    let response = h.dispatcher.dispatch("close", b"").unwrap();

    assert_eq!(response, vec![ActionResult::new(SUCCESS_RESPONSE)]);
    assert_eq!(h.dispatcher.state(), LifecycleState::Closed);
    assert_eq!(h.events.lock().unwrap().last().unwrap(), "closed");
}

#[test]
fn test_close_error_propagates_and_keeps_state() {
    let mut h = harness_with(true);
    open(&mut h);

    let err = h.dispatcher.dispatch("close", b"").unwrap_err();

    assert!(matches!(err, BridgeError::UserFunction { stage: "close", .. }));
    assert_eq!(h.dispatcher.state(), LifecycleState::Opened);
}

#[test]
fn test_close_before_open_is_invalid() {
    let mut h = harness();
    let err = h.dispatcher.dispatch("close", b"").unwrap_err();
    assert!(matches!(err, BridgeError::InvalidState { .. }));
}

#[test]
fn test_terminate_replies_before_exit() {
    // --- ARRANGE ---
    let mut h = harness();
    open(&mut h);

    // --- ACT ---
    let response = h.dispatcher.dispatch("terminate", b"").unwrap();
    h.events.lock().unwrap().push("response delivered".into());
    h.listener.signal().recv().unwrap();
    h.listener.acknowledge_flushed();
    h.dispatcher.shutdown_mut().wait().unwrap();

    // --- ASSERT ---
    assert!(response.is_empty());
    assert_eq!(h.dispatcher.state(), LifecycleState::Terminated);
    let events = h.events.lock().unwrap();
    assert_eq!(&events[events.len() - 2..], &["response delivered", "exit"]);
}
