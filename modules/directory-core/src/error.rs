use thiserror::Error;

/// Unique constraint guarding `locations.slug`.
pub const SLUG_CONSTRAINT: &str = "locations_slug_key";

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Rejected before any storage access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Another transaction committed the same slug first. Only the allocator
    /// recovers from this, once.
    #[error("slug already taken: {slug}")]
    UniqueSlugConflict { slug: String },

    /// Uniqueness conflict that survived the allocator's fallback attempt.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A mutation referenced a row that does not exist. Reads return empty
    /// results instead.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DirectoryError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Reclassify a storage error raised while inserting `slug`.
    ///
    /// A unique violation on [`SLUG_CONSTRAINT`] becomes
    /// [`DirectoryError::UniqueSlugConflict`]; everything else passes through
    /// as [`DirectoryError::Database`].
    pub fn from_slug_insert(err: sqlx::Error, slug: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() && db_err.constraint() == Some(SLUG_CONSTRAINT) {
                return Self::UniqueSlugConflict {
                    slug: slug.to_string(),
                };
            }
        }
        Self::Database(err)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_slug_conflict(&self) -> bool {
        matches!(self, Self::UniqueSlugConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_slug_conflicts() {
        let err = DirectoryError::from_slug_insert(sqlx::Error::RowNotFound, "leaf-house-denver");
        assert!(matches!(err, DirectoryError::Database(sqlx::Error::RowNotFound)));
        assert!(!err.is_slug_conflict());
    }

    #[test]
    fn slug_conflict_is_tagged() {
        let err = DirectoryError::UniqueSlugConflict {
            slug: "leaf-house-denver".into(),
        };
        assert!(err.is_slug_conflict());
        assert_eq!(err.to_string(), "slug already taken: leaf-house-denver");
    }

    #[test]
    fn not_found_is_distinct_from_invalid_input() {
        let err = DirectoryError::not_found("brand 42");
        assert!(matches!(err, DirectoryError::NotFound(_)));
        assert_eq!(err.to_string(), "not found: brand 42");
        assert!(!err.is_slug_conflict());
    }
}
