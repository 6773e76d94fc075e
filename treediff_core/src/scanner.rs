use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::{DirEntry, Parallelism, WalkDir};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use treediff_common::{ComparisonWarning, EngineOptions, IgnoreRules, TreeDiffError};

/// One item produced while walking a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// A regular file, relative to the walked root
    File(PathBuf),
    /// Something could not be read; the walk went on without it
    Skipped(ComparisonWarning),
}

/// Files found under one root plus the problems met on the way
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<ComparisonWarning>,
}

/// Folder scanner built on jwalk that prunes ignored names before descending
pub struct FolderScanner {
    rules: IgnoreRules,
    patterns: Option<Gitignore>,
    follow_symlinks: bool,
    parallel: bool,
}

impl FolderScanner {
    pub fn new(rules: IgnoreRules, options: &EngineOptions) -> Self {
        let patterns = Self::build_pattern_ignore(&rules);
        Self {
            rules,
            patterns,
            follow_symlinks: options.follow_symlinks,
            parallel: options.parallel,
        }
    }

    /// Build a Gitignore from the glob patterns in the rules
    fn build_pattern_ignore(rules: &IgnoreRules) -> Option<Gitignore> {
        if rules.patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &rules.patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                warn!("Ignoring invalid pattern '{}': {}", pattern, err);
            } else {
                debug!("Added ignore pattern: {}", pattern);
            }
        }

        match builder.build() {
            Ok(ignore) => Some(ignore),
            Err(e) => {
                warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Lazily walk `root`, yielding every non-ignored file relative to it.
    ///
    /// Siblings are visited in file-name order. Ignored directories are removed
    /// from the listing before jwalk descends, so nothing under them is read.
    pub fn walk(&self, root: &Path) -> Result<impl Iterator<Item = WalkEvent>, TreeDiffError> {
        ensure_root(root)?;

        let rules = self.rules.clone();
        let patterns = self.patterns.clone();
        let base = root.to_path_buf();

        let mut walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false)
            .sort(true)
            .process_read_dir(move |_depth, _dir, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => keep_entry(&rules, patterns.as_ref(), &base, entry),
                    // Errors are kept so the iterator reports them
                    Err(_) => true,
                });
            });

        if !self.parallel {
            walker = walker.parallelism(Parallelism::Serial);
        }

        let root = root.to_path_buf();
        Ok(walker.into_iter().filter_map(move |entry| match entry {
            Ok(entry) => {
                // jwalk reports a directory it could not list on the entry itself
                if let Some(err) = &entry.read_children_error {
                    let path = entry.path();
                    warn!("Skipping unreadable directory {}: {}", path.display(), err);
                    return Some(WalkEvent::Skipped(ComparisonWarning::SubtreeUnreadable {
                        path,
                        reason: err.to_string(),
                    }));
                }
                if !entry.file_type().is_file() {
                    return None;
                }
                let path = entry.path();
                match path.strip_prefix(&root) {
                    Ok(relative) => Some(WalkEvent::File(relative.to_path_buf())),
                    Err(e) => Some(WalkEvent::Skipped(ComparisonWarning::SubtreeUnreadable {
                        path,
                        reason: e.to_string(),
                    })),
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.clone());
                warn!("Skipping unreadable entry {}: {}", path.display(), err);
                Some(WalkEvent::Skipped(ComparisonWarning::SubtreeUnreadable {
                    path,
                    reason: err.to_string(),
                }))
            }
        }))
    }

    /// Walk a root to completion
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, TreeDiffError> {
        self.scan_with_cancel(root, None)
    }

    /// Walk a root to completion, checking `cancel` between entries
    pub fn scan_with_cancel(
        &self,
        root: &Path,
        cancel: Option<&AtomicBool>,
    ) -> Result<ScanOutcome, TreeDiffError> {
        let mut outcome = ScanOutcome::default();

        for event in self.walk(root)? {
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                return Err(TreeDiffError::Cancelled);
            }

            match event {
                WalkEvent::File(path) => outcome.files.push(path),
                WalkEvent::Skipped(warning) => outcome.warnings.push(warning),
            }
        }

        debug!(
            "Scanned {} files from {:?} ({} skipped)",
            outcome.files.len(),
            root,
            outcome.warnings.len()
        );
        Ok(outcome)
    }
}

/// A comparison cannot start unless the root is an existing directory
pub fn ensure_root(root: &Path) -> Result<(), TreeDiffError> {
    if !root.exists() {
        return Err(TreeDiffError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(TreeDiffError::Path(format!(
            "Root is not a directory: {}",
            root.display()
        )));
    }
    Ok(())
}

fn keep_entry(
    rules: &IgnoreRules,
    patterns: Option<&Gitignore>,
    base: &Path,
    entry: &DirEntry<((), ())>,
) -> bool {
    let name = entry.file_name().to_string_lossy();
    let file_type = entry.file_type();
    let is_dir = file_type.is_dir();

    if is_dir {
        if rules.ignores_dir(&name) {
            debug!("Pruning ignored directory {:?}", entry.path());
            return false;
        }
    } else if file_type.is_file() {
        if rules.ignores_file(&name) {
            debug!("Skipping ignored file {:?}", entry.path());
            return false;
        }
    } else {
        debug!("Skipping symlink or special file {:?}", entry.path());
        return false;
    }

    if let Some(patterns) = patterns {
        let path = entry.path();
        let relative = path.strip_prefix(base).unwrap_or(&path);
        if patterns.matched(relative, is_dir).is_ignore() {
            debug!("Skipping {:?} (pattern match)", relative);
            return false;
        }
    }

    true
}
