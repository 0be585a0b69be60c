use super::*;
use crate::logging::NoopLogSink;
use crate::marshal::{to_rows, Row, ScalarValue};
use crate::session::{ComputeStatus, HEALTH_CHECK_RESPONSE, SUCCESS_RESPONSE};
use crate::store::channel;
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use crossbeam_channel::bounded;
use std::sync::{Arc, Mutex};

fn doubling_map() -> UdfDefinition {
    UdfDefinition::map(|row: Row| {
        let x = row
            .get("x")
            .and_then(ScalarValue::as_i64)
            .ok_or("row has no integer x")?;
        Ok(Row::new().with("y", x * 2))
    })
}

fn test_server(exit_log: Arc<Mutex<Vec<String>>>) -> UdfServer {
    let shutdown = ShutdownController::new(Box::new(move || {
        exit_log.lock().unwrap().push("exit".into());
    }));
    UdfServer::new(
        doubling_map(),
        ServerConfig::default(),
        Box::new(NoopLogSink),
        shutdown,
    )
}

fn x_batch(values: Vec<i64>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int64, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap()
}

fn string_batch(column: &str, values: Vec<&str>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(column, DataType::Utf8, false)]));
    RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(values))]).unwrap()
}

#[test]
fn test_full_session_over_local_client() {
    // --- ARRANGE ---
    let exit_log = Arc::new(Mutex::new(Vec::new()));
    let (client, handle) = test_server(exit_log.clone()).spawn().unwrap();

    // --- ACT & ASSERT ---
    assert_eq!(
        client.action("health_check", b"").unwrap(),
        vec![ActionResult::new(HEALTH_CHECK_RESPONSE)]
    );

    client
        .put_channel(channel::CONF, string_batch("conf", vec!["/tmp", "INFO"]))
        .unwrap();
    client
        .put_channel(channel::ARGS, string_batch("args", vec![]))
        .unwrap();
    assert_eq!(
        client.action("open", b"").unwrap(),
        vec![ActionResult::new(SUCCESS_RESPONSE)]
    );

    client
        .put_channel(channel::TO_PYTHON, x_batch(vec![1, 2, 3]))
        .unwrap();
    let response = client.action("compute", b"").unwrap();
    assert_eq!(
        ComputeStatus::from_bytes(&response[0].body).unwrap(),
        ComputeStatus::Success
    );

    let output = client.get_channel(channel::FROM_PYTHON).unwrap();
    assert_eq!(
        to_rows(&output).unwrap(),
        vec![
            Row::new().with("y", 2),
            Row::new().with("y", 4),
            Row::new().with("y", 6),
        ]
    );
    assert!(matches!(
        client.get_channel(channel::TO_PYTHON),
        Err(BridgeError::NotFound { .. })
    ));

    client.action("input_exhausted", b"").unwrap();
    client.action("close", b"").unwrap();
    assert!(client.action("terminate", b"").unwrap().is_empty());

    handle.join().unwrap().unwrap();
    assert_eq!(*exit_log.lock().unwrap(), vec!["exit"]);
}

#[test]
fn test_terminate_reply_is_delivered_before_exit() {
    // --- ARRANGE ---
    let (reply_tx, reply_rx) = bounded(1);
    let pending_at_exit = Arc::new(Mutex::new(None));
    let observed = pending_at_exit.clone();
    let observer = reply_rx.clone();
    let shutdown = ShutdownController::new(Box::new(move || {
        *observed.lock().unwrap() = Some(observer.len());
    }));
    let server = UdfServer::new(
        doubling_map(),
        ServerConfig::default(),
        Box::new(NoopLogSink),
        shutdown,
    );
    let (requests_tx, requests_rx) = crossbeam_channel::unbounded();

    // --- ACT ---
    requests_tx
        .send(Request::Action {
            action: ActionRequest::new("terminate", Vec::new()),
            reply: reply_tx,
        })
        .unwrap();
    server.serve(requests_rx).unwrap();

    // --- ASSERT ---
    assert_eq!(*pending_at_exit.lock().unwrap(), Some(1));
    assert!(reply_rx.recv().unwrap().unwrap().is_empty());
}

#[test]
fn test_serve_returns_when_clients_disconnect() {
    let exit_log = Arc::new(Mutex::new(Vec::new()));
    let (client, handle) = test_server(exit_log.clone()).spawn().unwrap();

    client.action("health_check", b"").unwrap();
    drop(client);

    handle.join().unwrap().unwrap();
    assert!(exit_log.lock().unwrap().is_empty());
}

#[test]
fn test_client_after_shutdown_gets_transport_error() {
    let (client, handle) = test_server(Arc::new(Mutex::new(Vec::new())))
        .spawn()
        .unwrap();
    client.action("terminate", b"").unwrap();
    handle.join().unwrap().unwrap();

    let err = client.action("health_check", b"").unwrap_err();
    assert!(matches!(err, BridgeError::Transport(_)));
}

#[test]
fn test_unknown_action_reaches_client_as_error() {
    let (client, handle) = test_server(Arc::new(Mutex::new(Vec::new())))
        .spawn()
        .unwrap();

    let err = client.action("explode", b"").unwrap_err();
    assert!(matches!(err, BridgeError::UnknownAction(ref name) if name == "explode"));

    drop(client);
    handle.join().unwrap().unwrap();
}

#[test]
fn test_do_get_missing_is_not_found() {
    let server = test_server(Arc::new(Mutex::new(Vec::new())));
    let ticket = Ticket::for_key(&ChannelKey::for_channel(channel::FROM_PYTHON)).unwrap();

    let err = server.do_get(&ticket).unwrap_err();

    assert!(matches!(err, BridgeError::NotFound { ref key } if key == "path:fromPython"));
}

#[test]
fn test_do_get_rejects_garbage_ticket() {
    let server = test_server(Arc::new(Mutex::new(Vec::new())));
    let ticket = Ticket {
        ticket: b"not json".to_vec(),
    };

    assert!(matches!(
        server.do_get(&ticket),
        Err(BridgeError::InvalidTicket(_))
    ));
}

#[test]
fn test_flight_info_describes_staged_batch() {
    // --- ARRANGE ---
    let mut server = test_server(Arc::new(Mutex::new(Vec::new())));
    let descriptor = FlightDescriptor::for_path(channel::TO_PYTHON);
    let batch = x_batch(vec![7, 8, 9]);
    server.do_put(&descriptor, batch.clone()).unwrap();

    // --- ACT ---
    let info = server.get_flight_info(&descriptor).unwrap();

    // --- ASSERT ---
    assert_eq!(info.descriptor, descriptor);
    assert_eq!(info.schema, batch.schema());
    assert_eq!(info.total_records, 3);
    assert!(info.total_bytes > 0);
    assert_eq!(
        info.ticket.key().unwrap(),
        ChannelKey::for_channel(channel::TO_PYTHON)
    );
    assert_eq!(server.do_get(&info.ticket).unwrap(), batch);
}

#[test]
fn test_list_flights_and_missing_info() {
    let mut server = test_server(Arc::new(Mutex::new(Vec::new())));
    server
        .do_put(&FlightDescriptor::for_path(channel::TO_PYTHON), x_batch(vec![1]))
        .unwrap();
    server
        .do_put(&FlightDescriptor::for_command(b"cmd".to_vec()), x_batch(vec![1, 2]))
        .unwrap();

    let mut counts: Vec<usize> = server
        .list_flights()
        .unwrap()
        .iter()
        .map(|info| info.total_records)
        .collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);

    let missing = server.get_flight_info(&FlightDescriptor::for_path("nowhere"));
    assert!(matches!(missing, Err(BridgeError::NotFound { .. })));
}

#[test]
fn test_location_follows_config() {
    let server = UdfServer::new(
        doubling_map(),
        ServerConfig {
            port: 8815,
            ..Default::default()
        },
        Box::new(NoopLogSink),
        ShutdownController::new(Box::new(|| {})),
    );
    assert_eq!(server.location(), "grpc+tcp://localhost:8815");
    assert_eq!(server.state(), LifecycleState::Created);
}
