//! Fuzz target: text channel → `LinkService`
//!
//! Pushes arbitrary text notifications through a connected service with
//! a signing request in flight.  Nothing may panic, and once the input
//! is consumed the outbox holds at most the original request.
//!
//! cargo fuzz run fuzz_inbound_message

#![no_main]

use libfuzzer_sys::fuzz_target;
use steptosign::app::events::AppEvent;
use steptosign::app::ports::EventSink;
use steptosign::app::service::LinkService;
use steptosign::config::LinkConfig;
use steptosign::link::{Capabilities, Connection, Notification};

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let mut svc = LinkService::new(LinkConfig::default());
    let connection = Connection {
        device_id: "fuzz".into(),
        handle: 1,
        capabilities: Capabilities::all(),
    };
    if svc.on_connected(connection, &mut Discard).is_err() {
        return;
    }
    let _ = svc.request_signature(b"fuzz", 0, &mut Discard);

    for (i, chunk) in data.chunks(20).enumerate() {
        svc.handle_notification(&Notification::text(chunk), i as u64, &mut Discard);
    }
    assert!(svc.pop_command().is_some());
    assert!(!svc.has_outbound());
    let _ = svc.take_signed();
});
