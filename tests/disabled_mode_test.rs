//! Integration tests for the global disabled mode.
//!
//! With sending disabled (the default), every operation skips device
//! interaction entirely and returns its dummy value, and the connection
//! registry is never touched - the dry-run guarantee.

use std::sync::Arc;

use visa_bundle::backend::SimBus;
use visa_bundle::VisaContext;

fn disabled_context() -> (Arc<SimBus>, VisaContext) {
    let bus = Arc::new(SimBus::new());
    let ctx = VisaContext::with_opener(bus.clone());
    // send_enabled defaults to false; nothing to do.
    (bus, ctx)
}

#[test]
fn open_holds_no_handle_and_skips_the_bus() {
    let (bus, ctx) = disabled_context();

    let instrument = ctx
        .instrument("dmm", "GPIB0::5::INSTR")
        .expect("disabled open never fails");

    assert!(instrument.handle().is_none());
    assert_eq!(bus.open_count("GPIB0::5::INSTR"), 0);
    assert!(ctx.registry().is_empty());
}

#[test]
fn query_returns_dummy_text() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    assert_eq!(instrument.query("*IDN?", None).expect("dummy"), "0");
}

#[test]
fn read_returns_dummy_text() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    assert_eq!(instrument.read(None).expect("dummy"), "0");
    assert_eq!(instrument.read(Some(16)).expect("dummy"), "0");
}

#[test]
fn read_binary_returns_empty_bytes() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    assert!(instrument.read_binary().expect("dummy").is_empty());
}

#[test]
fn query_binary_returns_dummy_bytes() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    assert_eq!(instrument.query_binary("CURVE?", None).expect("dummy"), b"0");
}

#[test]
fn writes_are_silent_no_ops() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    instrument.write("*RST").expect("no-op");
    instrument.write_binary(b"\x01\x02\x03").expect("no-op");
}

#[test]
fn close_is_a_no_op() {
    let (bus, ctx) = disabled_context();
    let mut instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    instrument.close();
    assert!(ctx.registry().is_empty());
    assert_eq!(bus.open_count("GPIB0::5::INSTR"), 0);
}

/// Flipping the flag takes effect on the next operation; an instrument
/// opened while disabled holds no handle, so enabled I/O on it reports the
/// missing capability rather than silently doing nothing.
#[test]
fn enabling_after_open_surfaces_the_missing_handle() {
    let (_bus, ctx) = disabled_context();
    let instrument = ctx.instrument("dmm", "GPIB0::5::INSTR").expect("open");

    ctx.settings().set_send_enabled(true);
    assert!(instrument.query("*IDN?", None).is_err());
}
