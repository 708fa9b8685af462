#![no_main]

use libfuzzer_sys::fuzz_target;

use phonelink_types::{Address, RecoverableSignature};

// Recover a signer from an arbitrary digest and signature.
// Malformed signatures must be rejected, never panic.
fuzz_target!(|data: &[u8]| {
    if data.len() < 32 + 65 {
        return;
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&data[..32]);
    let mut sig = [0u8; 65];
    sig.copy_from_slice(&data[32..97]);
    let signature = RecoverableSignature::new(sig);

    if let Ok(signer) = phonelink_crypto::recover_signer(&digest, &signature) {
        assert!(phonelink_crypto::verify_signature(&signer, &digest, &signature));
    }
    let _ = phonelink_crypto::verify_signature(&Address::new([0; 20]), &digest, &signature);

    // The same bytes as a hex string through the wire parser.
    let text = format!("0x{}", hex_lower(&data[32..97]));
    let parsed: Result<RecoverableSignature, _> = text.parse();
    assert_eq!(parsed.ok(), Some(signature));
});

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
