#![no_main]

use classic_protocol::config::ProtocolConfig;
use classic_protocol::protocol::session::ProtocolSession;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary server traffic must never panic the session
    let mut session = ProtocolSession::new(&ProtocolConfig::default());
    let mut offset = 0;
    while offset < data.len() {
        let batch = session.dispatch_all(&data[offset..]);
        offset += batch.consumed;
        match batch.error {
            // skip the unknown byte and resync on the next one
            Some(e) if !e.is_fatal() => offset += 1,
            Some(_) => break,
            None if batch.consumed == 0 => break,
            None => {}
        }
    }
    let _ = session.drain_events();
    let _ = session.drain_outgoing();
});
