//! Span constructors for the validator's recurring operations.
//!
//! Consistent span names and fields make it easy to filter one request or
//! one driver tick out of interleaved logs.

use phonelink_types::RequestId;
use tracing::{info_span, Span};

/// One driver-loop tick.
pub fn tick_span(validator_index: Option<u32>) -> Span {
    info_span!("tick", validator_index = ?validator_index)
}

/// Driver-loop work on one record.
pub fn record_span(request_id: &RequestId, step: &str) -> Span {
    info_span!("record", request_id = %request_id, step = %step)
}

/// Handling of one inbound API call.
pub fn api_span(operation: &str) -> Span {
    info_span!("api", operation = %operation)
}

/// Peer reconciliation and health check.
pub fn reconcile_span(period: u64) -> Span {
    info_span!("reconcile", period = period)
}
