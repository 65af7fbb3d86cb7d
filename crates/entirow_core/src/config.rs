//! Session configuration.

/// Configuration for a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum cached records per entity type (`None` = unbounded).
    ///
    /// When a type's identity map grows past this, the least recently used
    /// records that nobody outside the map still holds are evicted. Records
    /// that are still held are never evicted.
    pub identity_map_capacity: Option<usize>,

    /// Whether `create` also requires every indexed column to be supplied.
    pub require_indexes_on_create: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identity_map_capacity: None,
            require_indexes_on_create: false,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each identity map to `capacity` unheld records.
    #[must_use]
    pub const fn identity_map_capacity(mut self, capacity: usize) -> Self {
        self.identity_map_capacity = Some(capacity);
        self
    }

    /// Removes the identity map bound.
    #[must_use]
    pub const fn unbounded_identity_map(mut self) -> Self {
        self.identity_map_capacity = None;
        self
    }

    /// Sets whether `create` requires all indexed columns.
    #[must_use]
    pub const fn require_indexes_on_create(mut self, value: bool) -> Self {
        self.require_indexes_on_create = value;
        self
    }
}
