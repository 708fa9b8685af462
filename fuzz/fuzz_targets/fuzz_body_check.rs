#![no_main]

use libfuzzer_sys::fuzz_target;

use phonelink_rpc::params::{BroadcastBody, RequestBody, SubmitBody};

// Feed arbitrary JSON through the request body checks.
fuzz_target!(|data: &[u8]| {
    if let Ok(body) = serde_json::from_slice::<RequestBody>(data) {
        let _ = body.check();
    }
    if let Ok(body) = serde_json::from_slice::<BroadcastBody>(data) {
        let _ = body.check();
    }
    if let Ok(body) = serde_json::from_slice::<SubmitBody>(data) {
        let _ = body.check_submit();
        let _ = body.check_relayed();
    }

    // Stored records are bincode; corrupted entries must not panic.
    let _ = bincode::deserialize::<phonelink_types::VerificationRecord>(data);
});
