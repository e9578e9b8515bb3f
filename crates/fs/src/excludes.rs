use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use nixnav_runtime::{DAEMON_EXCLUDED_COMPONENTS, DAEMON_EXCLUDED_GLOBS};

/// Matcher for the daemon's hard-coded exclusion set. A path is excluded
/// when any of its segments equals one of the fixed component names or
/// matches one of the glob patterns.
pub struct ExcludeEngine {
    matcher: Gitignore,
}

impl ExcludeEngine {
    /// Build the matcher over the daemon's fixed pattern set. Rooted at
    /// `/` so any absolute path can be tested, ancestors included.
    pub fn daemon_defaults() -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(Path::new("/"));

        for pat in DAEMON_EXCLUDED_COMPONENTS {
            builder.add_line(None, pat)?;
        }
        for pat in DAEMON_EXCLUDED_GLOBS {
            builder.add_line(None, pat)?;
        }

        Ok(ExcludeEngine {
            matcher: builder.build()?,
        })
    }

    #[inline]
    #[must_use]
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

impl Default for ExcludeEngine {
    fn default() -> Self {
        // The fixed pattern set is known-valid; a failure here would be
        // a programming error, not an environment condition.
        Self::daemon_defaults().expect("build daemon exclusion matcher")
    }
}

#[cfg(test)]
#[path = "excludes_tests.rs"]
mod tests;
