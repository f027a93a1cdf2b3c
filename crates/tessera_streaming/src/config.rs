//! # Streaming Configuration
//!
//! Loaded once at startup from a flat TOML document:
//!
//! ```toml
//! post_process_threads = 4
//! merge_threads = 2
//! ready_queue_capacity = 4096
//! handoff_timeout_ms = 500
//! local_region_extents = 1
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessera_shared::{IVec3, LOCAL_REGION_EXTENT};

use crate::error::{StreamingError, StreamingResult};

/// Configuration for the streaming core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Worker threads running internal lighting and compaction.
    pub post_process_threads: usize,
    /// Worker threads running neighbor light merges.
    pub merge_threads: usize,
    /// Post-processed chunks that may wait for the consumer.
    pub ready_queue_capacity: usize,
    /// How long a worker waits on a full ready queue before dropping the chunk (ms).
    pub handoff_timeout_ms: u64,
    /// Chunk radius of the local view around a center chunk.
    pub local_region_extents: i32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            post_process_threads: 2,
            merge_threads: 2,
            ready_queue_capacity: 4096,
            handoff_timeout_ms: 500,
            local_region_extents: LOCAL_REGION_EXTENT,
        }
    }
}

impl StreamingConfig {
    /// Single-threaded pools, for tests and tools.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            post_process_threads: 1,
            merge_threads: 1,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(source: &str) -> StreamingResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| StreamingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigIo` if the file cannot be read, otherwise as `from_toml_str`.
    pub fn from_toml_file(path: impl AsRef<Path>) -> StreamingResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| StreamingError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first bad value.
    pub fn validate(&self) -> StreamingResult<()> {
        if self.post_process_threads == 0 {
            return Err(StreamingError::InvalidConfig(
                "post_process_threads must be at least 1".to_string(),
            ));
        }
        if self.merge_threads == 0 {
            return Err(StreamingError::InvalidConfig(
                "merge_threads must be at least 1".to_string(),
            ));
        }
        if self.ready_queue_capacity == 0 {
            return Err(StreamingError::InvalidConfig(
                "ready_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.local_region_extents < 1 {
            return Err(StreamingError::InvalidConfig(format!(
                "local_region_extents must be at least 1, got {}",
                self.local_region_extents
            )));
        }
        Ok(())
    }

    /// Handoff wait as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    /// Local view extents as a vector.
    #[inline]
    #[must_use]
    pub const fn local_extents(&self) -> IVec3 {
        IVec3::splat(self.local_region_extents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StreamingConfig::default().validate().is_ok());
        assert!(StreamingConfig::headless().validate().is_ok());
        assert_eq!(StreamingConfig::default().local_region_extents, LOCAL_REGION_EXTENT);
        assert_eq!(StreamingConfig::headless().merge_threads, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = StreamingConfig::from_toml_str("merge_threads = 3\nhandoff_timeout_ms = 50\n").unwrap();
        assert_eq!(config.merge_threads, 3);
        assert_eq!(config.handoff_timeout(), Duration::from_millis(50));
        assert_eq!(config.ready_queue_capacity, 4096);
        assert_eq!(config.local_extents(), IVec3::ONE);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = StreamingConfig::from_toml_str("post_process_threads = 0").unwrap_err();
        assert!(matches!(err, StreamingError::InvalidConfig(_)));

        let err = StreamingConfig::from_toml_str("local_region_extents = 0").unwrap_err();
        assert!(matches!(err, StreamingError::InvalidConfig(msg) if msg.contains("local_region_extents")));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(StreamingConfig::from_toml_str("worker_count = 4").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = StreamingConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, StreamingError::ConfigIo { .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("tessera_config_{}.toml", std::process::id()));
        std::fs::write(&path, "ready_queue_capacity = 16\n").unwrap();
        let config = StreamingConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.ready_queue_capacity, 16);
        std::fs::remove_file(&path).ok();
    }
}
