//! Integration tests for open retry and failure semantics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use visa_bundle::backend::SimBus;
use visa_bundle::{RetryPolicy, VisaContext, VisaError};

fn test_context(backoff: Duration) -> (Arc<SimBus>, VisaContext) {
    let bus = Arc::new(SimBus::new());
    let ctx = VisaContext::with_opener(bus.clone()).with_retry(RetryPolicy {
        max_attempts: 2,
        backoff,
        settle: Duration::from_millis(1),
    });
    ctx.settings().set_send_enabled(true);
    (bus, ctx)
}

/// When every attempt fails, exactly two attempts occur and the
/// constructor reports an open error naming instrument and address.
#[test]
fn exhausted_retries_fail_fatally() {
    let (bus, ctx) = test_context(Duration::from_millis(5));
    let resource = "USB0::0x1234::0x5678::INSTR";
    bus.fail_next_opens(resource, 10);

    let err = ctx.instrument("meter", resource).expect_err("must fail");
    match err {
        VisaError::Open { name, address } => {
            assert_eq!(name, "meter");
            assert_eq!(address, resource);
        }
        other => panic!("expected Open error, got: {other}"),
    }

    assert_eq!(bus.open_count(resource), 2, "exactly two attempts");
    assert!(ctx.registry().is_empty());
}

/// A single transient failure recovers on the second attempt, with the
/// backoff elapsing in between.
#[test]
fn transient_failure_recovers() {
    let backoff = Duration::from_millis(20);
    let (bus, ctx) = test_context(backoff);
    let resource = "USB0::0x1234::0x5678::INSTR";
    bus.fail_next_opens(resource, 1);

    let started = Instant::now();
    let instrument = ctx.instrument("meter", resource).expect("second try");
    assert!(started.elapsed() >= backoff, "backoff must elapse");

    assert_eq!(bus.open_count(resource), 2);
    assert!(instrument.handle().is_some());
    assert_eq!(ctx.registry().len(), 1);
}

/// Adopting an existing session is a pure fast path: no retry logic runs
/// and no open attempt is made.
#[test]
fn adoption_never_consumes_open_attempts() {
    let (bus, ctx) = test_context(Duration::from_millis(5));
    let resource = "GPIB0::5::INSTR";

    ctx.instrument("first", resource).expect("open");
    assert_eq!(bus.open_count(resource), 1);

    // Even with failures scripted, adoption does not touch the bus.
    bus.fail_next_opens(resource, 10);
    let second = ctx.instrument("second", resource).expect("adopt");
    assert_eq!(bus.open_count(resource), 1);
    assert!(second.handle().is_some());
}

/// A successful open clears pending device state before first use.
#[test]
fn open_clears_pending_device_state() {
    let (bus, ctx) = test_context(Duration::from_millis(5));
    let resource = "GPIB0::5::INSTR";

    ctx.instrument("meter", resource).expect("open");
    let session = bus.session(resource).expect("session exists");
    assert_eq!(session.call_log().first().map(String::as_str), Some("clear"));
}
