//! Row and object identifiers.

use ulid::Ulid;
use uuid::Uuid;

/// Issues identifiers for posts, reactions, comments and upload objects.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Lowercase ULID for a new row.
    ///
    /// IDs from different milliseconds sort by creation time, which the feed
    /// uses to break ties between rows sharing a `created_at` timestamp.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// 32 hex characters with no time component, for upload object names.
    #[must_use]
    pub fn generate_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_ids_are_lowercase_ulids() {
        let ids = IdGenerator::new();
        let id = ids.generate();

        assert_eq!(id.len(), 26);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, ids.generate());
    }

    #[test]
    fn test_row_ids_sort_across_milliseconds() {
        let ids = IdGenerator::new();
        let earlier = ids.generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = ids.generate();

        assert!(earlier < later);
    }

    #[test]
    fn test_tokens_are_hex() {
        let token = IdGenerator::new().generate_token();

        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
