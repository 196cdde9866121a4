//! Integration tests for the I/O primitives against the simulated bus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use visa_bundle::backend::SimBus;
use visa_bundle::{RetryPolicy, VisaContext, VisaError};

fn test_context() -> (Arc<SimBus>, VisaContext) {
    let bus = Arc::new(SimBus::new());
    let ctx = VisaContext::with_opener(bus.clone()).with_retry(RetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_millis(5),
        settle: Duration::from_millis(1),
    });
    ctx.settings().set_send_enabled(true);
    (bus, ctx)
}

#[test]
fn query_returns_the_instrument_response() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    let session = bus.session("SIM::1::INSTR").expect("session");
    session.stub_reply("MEAS:VOLT:DC?", "+1.2345E-01");

    let response = instrument
        .query("MEAS:VOLT:DC?", None)
        .expect("query succeeds");
    assert_eq!(response, "+1.2345E-01");
}

#[test]
fn query_failure_wraps_as_query_error_with_context() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    let session = bus.session("SIM::1::INSTR").expect("session");
    session.inject_next_failure();

    let err = instrument.query("*IDN?", None).expect_err("injected");
    match err {
        VisaError::Query {
            name,
            address,
            command,
        } => {
            assert_eq!(name, "scope");
            assert_eq!(address, "SIM::1::INSTR");
            assert_eq!(command, "*IDN?");
        }
        other => panic!("expected Query error, got: {other}"),
    }
}

#[test]
fn write_sends_without_reading() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    instrument.write("*RST").expect("write succeeds");

    let session = bus.session("SIM::1::INSTR").expect("session");
    let log = session.call_log();
    assert!(log.contains(&"send: *RST".to_string()));
    assert!(!log.iter().any(|entry| entry.starts_with("receive")));
}

#[test]
fn read_line_and_read_count_both_decode_text() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");
    let session = bus.session("SIM::1::INSTR").expect("session");

    session.push_bytes(b"READY\n");
    assert_eq!(instrument.read(None).expect("line read"), "READY");

    session.push_bytes(b"abcdef");
    assert_eq!(instrument.read(Some(4)).expect("count read"), "abcd");
    // The remaining two bytes are still buffered.
    assert_eq!(instrument.read(Some(2)).expect("count read"), "ef");
}

#[test]
fn read_failure_wraps_as_read_error() {
    let (_bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    // Nothing buffered: the transport reports an empty read.
    let err = instrument.read(None).expect_err("nothing to read");
    assert!(matches!(err, VisaError::Read { .. }));
}

#[test]
fn binary_round_trip_passes_bytes_verbatim() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");
    let session = bus.session("SIM::1::INSTR").expect("session");

    instrument
        .write_binary(&[0x01, 0x02, 0xFF])
        .expect("binary write");
    assert!(session
        .call_log()
        .contains(&"send_raw: 3 bytes".to_string()));

    session.push_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(
        instrument.read_binary().expect("binary read"),
        vec![0xDE, 0xAD, 0xBE, 0xEF]
    );
}

/// query_binary is write-then-wait-then-raw-read, in that order, with the
/// requested delay actually elapsing between the two.
#[test]
fn query_binary_is_write_wait_read() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");
    let session = bus.session("SIM::1::INSTR").expect("session");
    session.stub_reply("CURVE?", "#14\x01\x02\x03\x04");

    let delay = Duration::from_millis(50);
    let started = Instant::now();
    let response = instrument
        .query_binary("CURVE?", Some(delay))
        .expect("binary query");
    assert!(started.elapsed() >= delay, "delay must elapse");
    assert_eq!(response, b"#14\x01\x02\x03\x04\n");

    let log = session.call_log();
    let send_at = log
        .iter()
        .position(|entry| entry == "send: CURVE?")
        .expect("send logged");
    let read_at = log
        .iter()
        .position(|entry| entry == "receive_raw")
        .expect("raw read logged");
    assert!(send_at < read_at, "write must precede the raw read");
}

#[test]
fn query_binary_failure_wraps_as_query_binary_error() {
    let (bus, ctx) = test_context();
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    let session = bus.session("SIM::1::INSTR").expect("session");
    session.inject_next_failure();

    let err = instrument
        .query_binary("CURVE?", Some(Duration::from_millis(1)))
        .expect_err("injected");
    assert!(matches!(err, VisaError::QueryBinary { .. }));
}

/// Trace lines (with and without payload bodies) leave results untouched.
#[test]
fn print_mode_does_not_disturb_results() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let (_bus, ctx) = test_context();
    ctx.settings().set_print_enabled(true);
    let instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");

    let verbose = instrument.query("*IDN?", None).expect("query");

    ctx.settings().set_print_payloads(false);
    let redacted = instrument.query("*IDN?", None).expect("query");
    assert_eq!(verbose, redacted);
}

/// Operations on a closed instrument report the missing capability.
#[test]
fn io_after_close_reports_not_message_based() {
    let (_bus, ctx) = test_context();
    let mut instrument = ctx.instrument("scope", "SIM::1::INSTR").expect("open");
    instrument.close();

    let err = instrument.query("*IDN?", None).expect_err("closed");
    assert!(matches!(err, VisaError::NotMessageBased { .. }));
    let err = instrument.write("*RST").expect_err("closed");
    assert!(matches!(err, VisaError::NotMessageBased { .. }));
}
