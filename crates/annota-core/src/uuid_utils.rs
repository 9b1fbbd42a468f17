//! UUIDv7 utilities for time-ordered identifiers.
//!
//! Note ids and request ids use UUIDv7 (RFC 9562), which embeds a
//! millisecond-precision timestamp in the leading bits. Ids generated later
//! sort lexicographically after earlier ones, which keeps primary-key
//! inserts append-mostly.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
