#![no_main]

use classic_protocol::protocol::blocks::MapDimensions;
use classic_protocol::protocol::map_transfer::{MapTransfer, CHUNK_PAYLOAD};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed gzip headers and DEFLATE bodies must fail cleanly
    let mut transfer = MapTransfer::new(1 << 20);
    transfer.begin();
    for chunk in data.chunks(CHUNK_PAYLOAD) {
        if transfer.push_chunk(chunk).is_err() {
            return;
        }
    }
    if let Some(volume) = transfer.volume() {
        if let Ok(width) = u16::try_from(volume) {
            let _ = transfer.finalise(MapDimensions::new(width, 1, 1));
        }
    }
});
