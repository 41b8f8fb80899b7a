//! Record log configuration.

use crate::error::{CoreError, CoreResult};

/// Default number of retained records.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default growth quantum of a scratch buffer, in bytes.
pub const DEFAULT_SCRATCH_INCREMENT: usize = 1024;

/// Default upper bound on a single pending record (16 MiB).
pub const DEFAULT_MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Configuration for a record log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Maximum number of records retained before the oldest is evicted.
    pub capacity: usize,

    /// Scratch buffers grow in multiples of this many bytes.
    pub scratch_increment: usize,

    /// Largest record a writer may assemble.
    pub max_record_len: usize,

    /// Whether to sync the journal on every append (safer but slower).
    pub sync_on_append: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            scratch_increment: DEFAULT_SCRATCH_INCREMENT,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            sync_on_append: true,
        }
    }
}

impl LogConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retained records.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the scratch buffer growth quantum.
    #[must_use]
    pub const fn scratch_increment(mut self, bytes: usize) -> Self {
        self.scratch_increment = bytes;
        self
    }

    /// Sets the largest record a writer may assemble.
    #[must_use]
    pub const fn max_record_len(mut self, bytes: usize) -> Self {
        self.max_record_len = bytes;
        self
    }

    /// Sets whether every append is synced to the journal.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Checks that every setting is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero capacity, zero growth
    /// quantum or zero record limit.
    pub fn validate(&self) -> CoreResult<()> {
        if self.capacity == 0 {
            return Err(CoreError::invalid_config("capacity must be at least 1"));
        }
        if self.scratch_increment == 0 {
            return Err(CoreError::invalid_config(
                "scratch_increment must be at least 1",
            ));
        }
        if self.max_record_len == 0 {
            return Err(CoreError::invalid_config("max_record_len must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.scratch_increment, 1024);
        assert!(config.sync_on_append);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = LogConfig::new()
            .capacity(2)
            .scratch_increment(16)
            .max_record_len(64)
            .sync_on_append(false);

        assert_eq!(config.capacity, 2);
        assert_eq!(config.scratch_increment, 16);
        assert_eq!(config.max_record_len, 64);
        assert!(!config.sync_on_append);
    }

    #[test]
    fn zero_values_rejected() {
        assert!(LogConfig::new().capacity(0).validate().is_err());
        assert!(LogConfig::new().scratch_increment(0).validate().is_err());
        assert!(LogConfig::new().max_record_len(0).validate().is_err());
    }
}
