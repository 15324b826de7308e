//! Runtime limits for an [`Engine`](crate::Engine).
//!
//! Lengths and counts read off the wire are untrusted; the limits here bound how much a
//! single call will allocate and how deeply it will recurse before giving up.

pub const DEFAULT_PREALLOCATION_SIZE_LIMIT: usize = 4 << 20; // 4 MiB
pub const PREALLOCATION_SIZE_LIMIT_DISABLED: usize = usize::MAX;
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Engine configuration.
///
/// Defaults:
/// - Preallocation size limit is 4 MiB.
/// - Maximum record nesting depth is 64.
///
/// ```
/// use wirebind::Config;
///
/// let config = Config::new()
///     .with_preallocation_size_limit(1 << 10)
///     .with_max_depth(8);
/// assert_eq!(config.preallocation_size_limit(), 1024);
/// assert_eq!(config.max_depth(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    preallocation_size_limit: usize,
    max_depth: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            preallocation_size_limit: DEFAULT_PREALLOCATION_SIZE_LIMIT,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit, in bytes, on any single allocation sized from wire data.
    ///
    /// Applies to byte frames, blobs, strings and `Vec` reservations.
    pub const fn with_preallocation_size_limit(mut self, limit: usize) -> Self {
        self.preallocation_size_limit = limit;
        self
    }

    pub const fn disable_preallocation_size_limit(self) -> Self {
        self.with_preallocation_size_limit(PREALLOCATION_SIZE_LIMIT_DISABLED)
    }

    /// Maximum number of nested records walked in one call, the root included.
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub const fn preallocation_size_limit(&self) -> usize {
        self.preallocation_size_limit
    }

    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
