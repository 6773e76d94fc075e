use similar::{Algorithm, ChangeTag, TextDiff};
use std::fs;
use std::path::Path;
use tracing::warn;
use treediff_common::{ComparisonWarning, DecodePolicy, PairStatus, TreeDiffError};

/// Bytes inspected when deciding whether content is text
const TEXT_SNIFF_LEN: usize = 8192;

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Result of comparing the content of one file pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDiff {
    pub status: PairStatus,
    /// Count of `-` and `+` lines, context excluded
    pub line_count: usize,
    pub lines: Vec<String>,
    /// Set when the pair could not be decoded and the policy wants it reported
    pub warning: Option<ComparisonWarning>,
}

impl ContentDiff {
    fn identical() -> Self {
        Self {
            status: PairStatus::Identical,
            line_count: 0,
            lines: Vec::new(),
            warning: None,
        }
    }
}

/// Configuration for text comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextDiffConfig {
    pub decode_policy: DecodePolicy,
    /// Unchanged lines kept around each hunk
    pub context_lines: usize,
}

impl Default for TextDiffConfig {
    fn default() -> Self {
        Self {
            decode_policy: DecodePolicy::SkipAsIdentical,
            context_lines: 3,
        }
    }
}

/// Line-oriented unified diff engine
#[derive(Debug, Clone, Default)]
pub struct TextDiffEngine {
    config: TextDiffConfig,
}

impl TextDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TextDiffConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextDiffConfig {
        &self.config
    }

    /// Compare two files on disk.
    ///
    /// Read errors are returned as `Io`; `DecodeFailure` is only returned
    /// under `DecodePolicy::FailRun`. Files whose bytes differ are never
    /// reported identical unless the policy skips binary content.
    pub fn compare_files(
        &self,
        left_path: &Path,
        right_path: &Path,
    ) -> Result<ContentDiff, TreeDiffError> {
        let left = fs::read(left_path)?;
        let right = fs::read(right_path)?;

        if left == right {
            return Ok(ContentDiff::identical());
        }

        for (path, bytes) in [(left_path, &left), (right_path, &right)] {
            if !is_probably_text(bytes) {
                return self.undecodable(path);
            }
        }

        let left_text = String::from_utf8_lossy(&left);
        let right_text = String::from_utf8_lossy(&right);

        // The bytes differ only where decoding replaced them
        if left_text == right_text {
            return self.lossy_collision(left_path);
        }

        Ok(self.compare_text(
            &left_text,
            &right_text,
            &left_path.to_string_lossy(),
            &right_path.to_string_lossy(),
        ))
    }

    /// Unified diff of two texts.
    ///
    /// Lines keep their original terminators apart from the final `\n`, so a
    /// CRLF/LF mismatch shows up as a change.
    pub fn compare_text(
        &self,
        left: &str,
        right: &str,
        left_label: &str,
        right_label: &str,
    ) -> ContentDiff {
        if left == right {
            return ContentDiff::identical();
        }

        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_lines(left, right);

        let mut lines = Vec::new();
        let mut line_count = 0;

        let mut unified = diff.unified_diff();
        unified.context_radius(self.config.context_lines);

        for hunk in unified.iter_hunks() {
            if lines.is_empty() {
                lines.push(format!("--- {}", left_label));
                lines.push(format!("+++ {}", right_label));
            }
            lines.push(hunk.header().to_string());

            for change in hunk.iter_changes() {
                let sign = match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                };
                if change.tag() != ChangeTag::Equal {
                    line_count += 1;
                }

                let value = change.value();
                let value = value.strip_suffix('\n').unwrap_or(value);
                lines.push(format!("{}{}", sign, value));
                if change.missing_newline() {
                    lines.push(NO_NEWLINE_MARKER.to_string());
                }
            }
        }

        ContentDiff {
            status: PairStatus::Modified,
            line_count,
            lines,
            warning: None,
        }
    }

    /// Differing bytes that decode to the same text: `Modified` with no lines
    fn lossy_collision(&self, path: &Path) -> Result<ContentDiff, TreeDiffError> {
        if self.config.decode_policy == DecodePolicy::FailRun {
            return Err(TreeDiffError::DecodeFailure(path.to_path_buf()));
        }
        warn!(
            "{} differs only in bytes that are not valid UTF-8",
            path.display()
        );
        Ok(ContentDiff {
            status: PairStatus::Modified,
            line_count: 0,
            lines: Vec::new(),
            warning: Some(ComparisonWarning::DecodeFailure {
                path: path.to_path_buf(),
            }),
        })
    }

    fn undecodable(&self, path: &Path) -> Result<ContentDiff, TreeDiffError> {
        match self.config.decode_policy {
            DecodePolicy::SkipAsIdentical => {
                warn!(
                    "Cannot decode {} as text, treating pair as identical",
                    path.display()
                );
                Ok(ContentDiff::identical())
            }
            DecodePolicy::FailFile => {
                warn!("Cannot decode {} as text", path.display());
                Ok(ContentDiff {
                    status: PairStatus::Modified,
                    line_count: 0,
                    lines: Vec::new(),
                    warning: Some(ComparisonWarning::DecodeFailure {
                        path: path.to_path_buf(),
                    }),
                })
            }
            DecodePolicy::FailRun => Err(TreeDiffError::DecodeFailure(path.to_path_buf())),
        }
    }
}

/// Content with a NUL byte near the start is treated as binary
pub fn is_probably_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(TEXT_SNIFF_LEN)];
    !head.contains(&0)
}
