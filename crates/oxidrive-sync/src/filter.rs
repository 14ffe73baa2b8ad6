//! Ignore-pattern and size filtering
//!
//! Filters are applied by the diff algorithm against the authoritative
//! side for the configured direction, and re-applied by transfer tasks at
//! execution time because state may have changed since the decision.
//!
//! Patterns are globs matched against both the item name and its path
//! relative to the sync root. A pattern ending in `/` only matches
//! directories (`build/`), mirroring the usual ignore-file convention.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use oxidrive_core::domain::errors::SyncError;
use oxidrive_core::domain::node::{LocalNode, RemoteNode};
use oxidrive_core::domain::newtypes::RemotePath;

/// Compiled ignore patterns plus the optional size ceiling
pub struct PathFilter {
    /// Maximum file size in bytes; `None` disables the limit
    max_size: Option<u64>,
    ignored: GlobSet,
    pattern_count: usize,
}

impl PathFilter {
    /// Compiles the filter from configuration values.
    ///
    /// `max_size_kb` of 0 disables the size limit. Invalid glob patterns
    /// are rejected up front so a typo fails the run at startup rather
    /// than silently matching nothing.
    pub fn new(max_size_kb: u64, patterns: &[String]) -> Result<Self, SyncError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|err| {
                SyncError::InvalidTask(format!("invalid ignore pattern '{pattern}': {err}"))
            })?;
            builder.add(glob);
        }
        let ignored = builder
            .build()
            .map_err(|err| SyncError::InvalidTask(format!("invalid ignore patterns: {err}")))?;

        Ok(Self {
            max_size: (max_size_kb > 0).then_some(max_size_kb * 1024),
            ignored,
            pattern_count: patterns.len(),
        })
    }

    /// A filter that skips nothing
    pub fn permissive() -> Self {
        Self::new(0, &[]).expect("empty filter always compiles")
    }

    /// Returns true if `size` exceeds the configured maximum
    pub fn is_size_invalid(&self, name: &str, size: u64) -> bool {
        match self.max_size {
            Some(max) if size > max => {
                debug!(
                    file = name,
                    size_kb = size / 1024,
                    max_kb = max / 1024,
                    "skipping file larger than the configured maximum"
                );
                true
            }
            _ => false,
        }
    }

    /// Returns true if a remote item matches an ignore pattern, relative
    /// to the remote root of the run
    pub fn is_ignored_remote(&self, root: &RemotePath, node: &RemoteNode) -> bool {
        if self.pattern_count == 0 {
            return false;
        }
        let relative = node
            .path
            .relative_to(root)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let ignored = self.matches(&node.name, relative.as_deref(), node.is_directory);
        if ignored {
            debug!(path = %node.path, "skipping ignored remote item");
        }
        ignored
    }

    /// Returns true if a local item matches an ignore pattern, relative
    /// to the local root of the run
    pub fn is_ignored_local(&self, root: &Path, node: &LocalNode) -> bool {
        if self.pattern_count == 0 {
            return false;
        }
        let relative = node
            .path()
            .strip_prefix(root)
            .ok()
            .filter(|r| !r.as_os_str().is_empty())
            .map(|r| r.to_string_lossy().into_owned());
        let ignored = self.matches(&node.name(), relative.as_deref(), node.is_dir());
        if ignored {
            debug!(path = %node.path().display(), "skipping ignored local item");
        }
        ignored
    }

    fn matches(&self, name: &str, relative: Option<&str>, is_dir: bool) -> bool {
        let mut candidates: Vec<String> = Vec::with_capacity(4);
        candidates.push(name.to_string());
        if let Some(relative) = relative {
            candidates.push(relative.to_string());
        }
        if is_dir {
            // Trailing-slash forms so `build/` style patterns can target
            // directories specifically.
            candidates.push(format!("{name}/"));
            if let Some(relative) = relative {
                candidates.push(format!("{relative}/"));
            }
        }
        candidates.iter().any(|c| self.ignored.is_match(c))
    }
}
