#![no_main]

use libfuzzer_sys::fuzz_target;

// Phone normalisation and fragment extraction on arbitrary text.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(phone) = phonelink_verification::normalize_phone(text) {
        assert_eq!(phonelink_verification::normalize_phone(&phone).ok(), Some(phone));
    }

    let index = data.first().copied().unwrap_or(0) as u32;
    if let Ok(fragment) = phonelink_verification::code_fragment(text, index) {
        assert_eq!(fragment.len(), phonelink_verification::FRAGMENT_LEN);
    }
});
