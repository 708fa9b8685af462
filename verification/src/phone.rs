//! Phone number normalisation.
//!
//! Every validator hashes the phone number it stores, so all of them must agree
//! on one spelling. Numbers are accepted only with an explicit country code and
//! rewritten in international format, e.g. `+82 10-1234-1000`.

use crate::VerificationError;

/// Parse, validate and reformat `raw` in international format.
pub fn normalize_phone(raw: &str) -> Result<String, VerificationError> {
    let trimmed = raw.trim();
    let number = phonenumber::parse(None, trimmed)
        .map_err(|e| VerificationError::InvalidPhoneNumber(format!("{trimmed}: {e}")))?;
    if !phonenumber::is_valid(&number) {
        return Err(VerificationError::InvalidPhoneNumber(trimmed.to_string()));
    }
    Ok(number
        .format()
        .mode(phonenumber::Mode::International)
        .to_string())
}
