use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `.gitignore` matcher rooted at the workspace
#[derive(Clone)]
pub struct GitignoreFilter {
    inner: Option<Gitignore>,
    workspace_root: PathBuf,
}

impl GitignoreFilter {
    /// Create a new GitignoreFilter for the given workspace root.
    /// Loads the .gitignore file if it exists.
    pub fn new(workspace_root: &Path) -> Self {
        let gitignore_path = workspace_root.join(".gitignore");

        let gitignore = if gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(workspace_root);
            // add() returns Option<Error>, not Result
            if let Some(e) = builder.add(&gitignore_path) {
                warn!("[GITIGNORE] Failed to load .gitignore: {}", e);
                None
            } else {
                match builder.build() {
                    Ok(gitignore) => Some(gitignore),
                    Err(e) => {
                        // fail open
                        warn!("[GITIGNORE] Failed to build gitignore matcher: {}", e);
                        None
                    }
                }
            }
        } else {
            debug!("[GITIGNORE] No .gitignore found at {}", gitignore_path.display());
            None
        };

        Self {
            inner: gitignore,
            workspace_root: workspace_root.to_path_buf(),
        }
    }

    /// A filter that never ignores anything
    pub fn disabled(workspace_root: &Path) -> Self {
        Self {
            inner: None,
            workspace_root: workspace_root.to_path_buf(),
        }
    }

    /// Returns true if the path SHOULD be ignored (filtered out).
    /// `path` may be absolute or relative to the workspace root.
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        let Some(ref gitignore) = self.inner else {
            return false;
        };

        let abs_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let rel_path = match abs_path.strip_prefix(&self.workspace_root) {
            Ok(p) => p,
            // outside the workspace
            Err(_) => return false,
        };

        matches!(
            gitignore.matched(rel_path, is_dir),
            ignore::Match::Ignore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_gitignore_basic() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        let gitignore_content = r#"
*.log
generated/
vendor.js
"#;
        fs::write(root.join(".gitignore"), gitignore_content).unwrap();

        let filter = GitignoreFilter::new(root);

        assert!(filter.should_ignore(&root.join("test.log"), false));
        assert!(filter.should_ignore(&root.join("generated"), true));
        assert!(filter.should_ignore(Path::new("lib/vendor.js"), false));

        assert!(!filter.should_ignore(&root.join("main.js"), false));
        assert!(!filter.should_ignore(&root.join("src"), true));
    }

    #[test]
    fn test_gitignore_negation() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        fs::write(root.join(".gitignore"), "*.js\n!keep.js\n").unwrap();

        let filter = GitignoreFilter::new(root);

        assert!(filter.should_ignore(&root.join("drop.js"), false));
        assert!(!filter.should_ignore(&root.join("keep.js"), false));
    }

    #[test]
    fn test_no_gitignore() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        let filter = GitignoreFilter::new(root);
        assert!(!filter.should_ignore(&root.join("anything.js"), false));

        fs::write(root.join(".gitignore"), "*.js\n").unwrap();
        let disabled = GitignoreFilter::disabled(root);
        assert!(!disabled.should_ignore(&root.join("anything.js"), false));
    }
}
