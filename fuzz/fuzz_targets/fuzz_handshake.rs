#![no_main]

use libfuzzer_sys::fuzz_target;
use hostserver_protocol::protocol::messages::{
    DataQueueExchangeAttributesResponse, RandomSeedExchangeResponse,
    RemoteCommandExchangeAttributesResponse, SignonInfoResponse, SignonSeedExchangeResponse,
    StartServerResponse,
};

fuzz_target!(|data: &[u8]| {
    // Reply decoders see whatever the host sends; none may panic
    let _ = SignonSeedExchangeResponse::decode(data);
    let _ = SignonInfoResponse::decode(data);
    let _ = RandomSeedExchangeResponse::decode(data);
    let _ = StartServerResponse::decode(data);
    let _ = DataQueueExchangeAttributesResponse::decode(data);
    let _ = RemoteCommandExchangeAttributesResponse::decode(data);
});
