//! Phone verification rules shared by every validator.
//!
//! A verification code is split into two-digit fragments, one per validator,
//! ordered by validator index. Each validator issues its own fragment over SMS
//! and later checks the fragment at its own offset in the code the user submits.
//!
//! Everything here is pure: the engine supplies records, time and the
//! validator index, and persists whatever these functions decide.

pub mod code;
pub mod error;
pub mod phone;
pub mod submit;

pub use code::{code_fragment, CodeGenerator, FRAGMENT_LEN};
pub use error::VerificationError;
pub use phone::normalize_phone;
pub use submit::{evaluate_submit, SubmitOutcome};
