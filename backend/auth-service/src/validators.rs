/// Input validators for auth-service requests

/// Longest identifier accepted, in characters (an RFC 5321 mailbox path limit)
pub const MAX_IDENTIFIER_LENGTH: usize = 254;

/// Principal identifiers: non-empty, bounded, no whitespace or control characters
pub fn validate_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier.chars().count() <= MAX_IDENTIFIER_LENGTH
        && !identifier
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
}
