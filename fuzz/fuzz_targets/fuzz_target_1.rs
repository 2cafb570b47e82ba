#![no_main]

use libfuzzer_sys::fuzz_target;
use hostserver_protocol::Packet;

fuzz_target!(|data: &[u8]| {
    // Field scans over arbitrary frames must stay inside the buffer and end
    if let Ok(packet) = Packet::from_bytes(data) {
        let index = packet.field_index();
        for id in index.ids() {
            let _ = index.get(&packet, id);
            let _ = packet.get_field(id);
            let _ = packet.get_date(id);
        }
    }
});
