use crate::matcher::{match_trees, MatchedPath, Presence};
use crate::scanner::{ensure_root, FolderScanner, ScanOutcome};
use crate::text_diff::{TextDiffConfig, TextDiffEngine};
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use treediff_common::{
    CompareRequest, Comparison, ComparisonWarning, DiffRecord, EngineOptions, PairStatus,
    TreeDiffError,
};

const COMPARE_BUF_SIZE: usize = 64 * 1024;

/// Outcome of one matched path: a record and possibly a warning
type PairOutcome = (Option<DiffRecord>, Option<ComparisonWarning>);

/// Comparison engine for two directory trees
pub struct ComparisonEngine {
    options: EngineOptions,
    differ: TextDiffEngine,
}

impl ComparisonEngine {
    pub fn new(options: EngineOptions) -> Self {
        let differ = TextDiffEngine::with_config(TextDiffConfig {
            decode_policy: options.decode_policy,
            context_lines: options.context_lines,
        });
        Self { options, differ }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Compare two roots and return one record per relative path
    pub fn compare(&self, request: &CompareRequest) -> Result<Comparison, TreeDiffError> {
        self.compare_with_cancel(request, None)
    }

    /// Like [`compare`](Self::compare), checking `cancel` between walk
    /// entries and between file pairs
    pub fn compare_with_cancel(
        &self,
        request: &CompareRequest,
        cancel: Option<&AtomicBool>,
    ) -> Result<Comparison, TreeDiffError> {
        let left_root = request.left_root.as_path();
        let right_root = request.right_root.as_path();

        ensure_root(left_root)?;
        ensure_root(right_root)?;

        info!("Comparing {} with {}", left_root.display(), right_root.display());

        // Each walk already reads directories on the rayon pool through jwalk
        let scanner = FolderScanner::new(request.ignore.clone(), &self.options);
        let ScanOutcome {
            files: left_files,
            warnings: mut warnings,
        } = scanner.scan_with_cancel(left_root, cancel)?;
        let right = scanner.scan_with_cancel(right_root, cancel)?;
        warnings.extend(right.warnings);

        info!(
            "Found {} files on the left, {} on the right",
            left_files.len(),
            right.files.len()
        );

        let matched = match_trees(left_files, right.files);

        let outcomes: Vec<PairOutcome> = if self.options.parallel {
            matched
                .par_iter()
                .map(|m| self.compare_matched(left_root, right_root, m, cancel))
                .collect::<Result<_, _>>()?
        } else {
            matched
                .iter()
                .map(|m| self.compare_matched(left_root, right_root, m, cancel))
                .collect::<Result<_, _>>()?
        };

        let mut records = Vec::with_capacity(outcomes.len());
        for (record, warning) in outcomes {
            records.extend(record);
            warnings.extend(warning);
        }

        debug!(
            "Generated {} records with {} warnings",
            records.len(),
            warnings.len()
        );
        Ok(Comparison { records, warnings })
    }

    fn compare_matched(
        &self,
        left_root: &Path,
        right_root: &Path,
        matched: &MatchedPath,
        cancel: Option<&AtomicBool>,
    ) -> Result<PairOutcome, TreeDiffError> {
        if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
            return Err(TreeDiffError::Cancelled);
        }

        let relative = matched.relative_path.clone();
        match matched.presence {
            Presence::OnlyLeft => {
                let left = left_root.join(&relative);
                Ok((Some(DiffRecord::only_in_left(relative, left)), None))
            }
            Presence::OnlyRight => {
                let right = right_root.join(&relative);
                Ok((Some(DiffRecord::only_in_right(relative, right)), None))
            }
            Presence::Both => self.compare_pair(left_root, right_root, relative),
        }
    }

    /// Compare a path present on both sides. A pair that cannot be read is
    /// still recorded, as `Modified` with an empty diff, plus a warning.
    fn compare_pair(
        &self,
        left_root: &Path,
        right_root: &Path,
        relative: PathBuf,
    ) -> Result<PairOutcome, TreeDiffError> {
        let left = left_root.join(&relative);
        let right = right_root.join(&relative);

        match files_identical(&left, &right) {
            Ok(true) => return Ok((Some(DiffRecord::identical(relative, left, right)), None)),
            Ok(false) => {}
            Err(e) => return Ok(unreadable(relative, left, right, &e)),
        }

        let diff = match self.differ.compare_files(&left, &right) {
            Ok(diff) => diff,
            Err(TreeDiffError::Io(e)) => return Ok(unreadable(relative, left, right, &e)),
            Err(e) => return Err(e),
        };

        let record = DiffRecord {
            relative_path: relative,
            left_path: Some(left),
            right_path: Some(right),
            status: diff.status,
            diff_line_count: diff.line_count,
            diff_lines: diff.lines,
        };
        Ok((Some(record), diff.warning))
    }
}

fn unreadable(relative: PathBuf, left: PathBuf, right: PathBuf, err: &io::Error) -> PairOutcome {
    warn!("Cannot read pair {}: {}", relative.display(), err);
    let warning = ComparisonWarning::FileUnreadable {
        path: relative.clone(),
        reason: err.to_string(),
    };
    let record = DiffRecord {
        relative_path: relative,
        left_path: Some(left),
        right_path: Some(right),
        status: PairStatus::Modified,
        diff_line_count: 0,
        diff_lines: Vec::new(),
    };
    (Some(record), Some(warning))
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

/// Size check followed by a chunked byte comparison
pub fn files_identical(left: &Path, right: &Path) -> io::Result<bool> {
    let mut left_file = File::open(left)?;
    let mut right_file = File::open(right)?;

    if left_file.metadata()?.len() != right_file.metadata()?.len() {
        return Ok(false);
    }

    let mut left_buf = vec![0u8; COMPARE_BUF_SIZE];
    let mut right_buf = vec![0u8; COMPARE_BUF_SIZE];

    loop {
        let n = read_full(&mut left_file, &mut left_buf)?;
        let m = read_full(&mut right_file, &mut right_buf)?;
        if n != m || left_buf[..n] != right_buf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Read until `buf` is full or the reader is exhausted
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
