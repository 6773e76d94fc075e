use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Status of one relative path across the two trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairStatus {
    /// Present on both sides with byte-identical content
    Identical,
    /// Present on both sides with differing content
    Modified,
    /// Present under the left root only
    OnlyInLeft,
    /// Present under the right root only
    OnlyInRight,
}

impl PairStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            PairStatus::Identical => "==",
            PairStatus::Modified => "!=",
            PairStatus::OnlyInLeft => "<<",
            PairStatus::OnlyInRight => ">>",
        }
    }
}

/// One line of the comparison result, keyed by relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub relative_path: PathBuf,
    /// Absolute path under the left root, `None` when the file is missing there
    pub left_path: Option<PathBuf>,
    /// Absolute path under the right root, `None` when the file is missing there
    pub right_path: Option<PathBuf>,
    pub status: PairStatus,
    /// Number of `-` and `+` lines in `diff_lines`
    pub diff_line_count: usize,
    /// Unified diff, only populated for `Modified`
    pub diff_lines: Vec<String>,
}

impl DiffRecord {
    pub fn identical(relative_path: PathBuf, left: PathBuf, right: PathBuf) -> Self {
        Self {
            relative_path,
            left_path: Some(left),
            right_path: Some(right),
            status: PairStatus::Identical,
            diff_line_count: 0,
            diff_lines: Vec::new(),
        }
    }

    pub fn only_in_left(relative_path: PathBuf, left: PathBuf) -> Self {
        Self {
            relative_path,
            left_path: Some(left),
            right_path: None,
            status: PairStatus::OnlyInLeft,
            diff_line_count: 0,
            diff_lines: Vec::new(),
        }
    }

    pub fn only_in_right(relative_path: PathBuf, right: PathBuf) -> Self {
        Self {
            relative_path,
            left_path: None,
            right_path: Some(right),
            status: PairStatus::OnlyInRight,
            diff_line_count: 0,
            diff_lines: Vec::new(),
        }
    }
}

/// Name-based exclusion rules applied identically to both roots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRules {
    /// File base names to skip
    #[serde(default)]
    pub files: BTreeSet<String>,
    /// Directory base names whose whole subtree is skipped
    #[serde(default)]
    pub dirs: BTreeSet<String>,
    /// Gitignore-style patterns matched against root-relative paths
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dirs.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn ignores_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn ignores_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }
}

/// What to do with a pair whose content cannot be read as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodePolicy {
    /// Report the pair as identical and only log the failure
    #[default]
    SkipAsIdentical,
    /// Abort the whole comparison
    FailRun,
    /// Report the pair as modified with an empty diff and attach a warning
    FailFile,
}

/// Inputs of a single comparison run
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub left_root: PathBuf,
    pub right_root: PathBuf,
    pub ignore: IgnoreRules,
}

impl CompareRequest {
    pub fn new(left_root: impl Into<PathBuf>, right_root: impl Into<PathBuf>) -> Self {
        Self {
            left_root: left_root.into(),
            right_root: right_root.into(),
            ignore: IgnoreRules::default(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    /// The same request with left and right exchanged
    pub fn swapped(&self) -> Self {
        Self {
            left_root: self.right_root.clone(),
            right_root: self.left_root.clone(),
            ignore: self.ignore.clone(),
        }
    }
}

/// Engine tuning knobs that do not change which paths are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub decode_policy: DecodePolicy,
    /// Unchanged lines shown around each hunk
    pub context_lines: usize,
    /// Read directories within each walk and diff pairs on the rayon pool
    pub parallel: bool,
    pub follow_symlinks: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            decode_policy: DecodePolicy::default(),
            context_lines: 3,
            parallel: true,
            follow_symlinks: false,
        }
    }
}

/// Non-fatal problem encountered during a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ComparisonWarning {
    /// A directory (or entry) could not be listed; nothing beneath it was compared
    SubtreeUnreadable { path: PathBuf, reason: String },
    /// A file present on both sides could not be read; its record is `Modified` with an empty diff
    FileUnreadable { path: PathBuf, reason: String },
    /// A file could not be decoded as text
    DecodeFailure { path: PathBuf },
}

impl fmt::Display for ComparisonWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonWarning::SubtreeUnreadable { path, reason } => {
                write!(f, "skipped unreadable subtree {}: {}", path.display(), reason)
            }
            ComparisonWarning::FileUnreadable { path, reason } => {
                write!(f, "skipped unreadable file {}: {}", path.display(), reason)
            }
            ComparisonWarning::DecodeFailure { path } => {
                write!(f, "could not decode {} as text", path.display())
            }
        }
    }
}

/// Complete outcome of one comparison run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// One record per relative path, sorted by relative path
    pub records: Vec<DiffRecord>,
    pub warnings: Vec<ComparisonWarning>,
}

impl Comparison {
    pub fn summary(&self) -> ComparisonSummary {
        let mut summary = ComparisonSummary {
            total: self.records.len(),
            ..Default::default()
        };
        for record in &self.records {
            match record.status {
                PairStatus::Identical => summary.identical += 1,
                PairStatus::Modified => summary.modified += 1,
                PairStatus::OnlyInLeft => summary.only_in_left += 1,
                PairStatus::OnlyInRight => summary.only_in_right += 1,
            }
        }
        summary
    }

    pub fn has_differences(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.status != PairStatus::Identical)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total: usize,
    pub identical: usize,
    pub modified: usize,
    pub only_in_left: usize,
    pub only_in_right: usize,
}

/// BLAKE3 hash value (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<blake3::Hash> for Blake3Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// File base names to skip (e.g. ".DS_Store")
    pub ignore_files: Vec<String>,

    /// Directory base names to skip together with their contents (e.g. ".git")
    pub ignore_dirs: Vec<String>,

    /// Gitignore-style patterns (e.g. "*.o", "build/")
    pub ignore_patterns: Vec<String>,

    /// Whether to follow symbolic links
    pub follow_symlinks: bool,

    pub decode_policy: DecodePolicy,

    /// Context lines around each diff hunk
    pub context_lines: usize,

    /// Whether to compare on multiple threads
    pub parallel: bool,

    /// Hash-verify files written by `overwrite`
    pub verify_copies: bool,

    /// Enable portable mode (config alongside binary)
    pub portable_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = EngineOptions::default();
        Self {
            ignore_files: Vec::new(),
            ignore_dirs: Vec::new(),
            ignore_patterns: Vec::new(),
            follow_symlinks: engine.follow_symlinks,
            decode_policy: engine.decode_policy,
            context_lines: engine.context_lines,
            parallel: engine.parallel,
            verify_copies: false,
            portable_mode: false,
        }
    }
}

impl AppConfig {
    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::new()
            .with_files(self.ignore_files.iter().cloned())
            .with_dirs(self.ignore_dirs.iter().cloned())
            .with_patterns(self.ignore_patterns.iter().cloned())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            decode_policy: self.decode_policy,
            context_lines: self.context_lines,
            parallel: self.parallel,
            follow_symlinks: self.follow_symlinks,
        }
    }
}
