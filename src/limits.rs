//! Hard caps and sanity bounds. Exceeding one is a validation error,
//! never silent truncation.

use crate::model::Ms;

/// Earliest accepted timestamp: 2000-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;

/// Latest accepted timestamp: 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single lesson never exceeds 12 hours.
pub const MAX_SESSION_DURATION_MS: Ms = 12 * 3_600_000;

/// Widest window accepted by overlap queries (5 weeks).
pub const MAX_QUERY_WINDOW_MS: Ms = 35 * 86_400_000;

/// Reservations retained per instructor (cancelled included).
pub const MAX_RESERVATIONS_PER_INSTRUCTOR: usize = 100_000;

pub const MAX_SCHOOLS: usize = 1024;

pub const MAX_SCHOOL_NAME_LEN: usize = 256;

pub const MAX_PLAN_KEY_LEN: usize = 64;
