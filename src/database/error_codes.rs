//! PostgreSQL SQLSTATE codes the store layer distinguishes.
//!
//! Full list: <https://www.postgresql.org/docs/current/errcodes-appendix.html>

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PgErrorCode;

impl PgErrorCode {
    /// Unique violation (duplicate key) - Code 23505
    ///
    /// Raised when two batches race to insert the same company/collection membership.
    pub const UNIQUE_VIOLATION: &'static str = "23505";

    /// Foreign key violation - Code 23503
    ///
    /// Raised when a membership insert references a company or collection that does
    /// not exist.
    pub const FOREIGN_KEY_VIOLATION: &'static str = "23503";

    pub fn is_unique_violation(code: &str) -> bool {
        code == Self::UNIQUE_VIOLATION
    }

    pub fn is_foreign_key_violation(code: &str) -> bool {
        code == Self::FOREIGN_KEY_VIOLATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        assert!(PgErrorCode::is_unique_violation("23505"));
        assert!(!PgErrorCode::is_unique_violation("23503"));
        assert!(PgErrorCode::is_foreign_key_violation("23503"));
    }
}
