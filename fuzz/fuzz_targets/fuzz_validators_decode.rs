#![no_main]

use libfuzzer_sys::fuzz_target;

// Decode arbitrary `eth_call` return data as the registry's view results.
// Offsets and lengths come from untrusted input; out-of-range values must
// surface as errors.
fuzz_target!(|data: &[u8]| {
    let _ = phonelink_ledger::contract::decode_validators(data);
    let _ = phonelink_ledger::contract::decode_u64(data);
    let _ = phonelink_ledger::contract::decode_bool(data);
    let _ = phonelink_ledger::contract::decode_vote_count_status(data);

    let decoder = phonelink_crypto::abi::Decoder::new(data);
    let _ = decoder.string(0);
    let _ = decoder.bytes(0);
    let _ = decoder.address(0);
});
