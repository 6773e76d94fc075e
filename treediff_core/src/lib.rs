pub mod comparison;
pub mod file_operations;
pub mod matcher;
pub mod scanner;
pub mod text_diff;

pub use comparison::{files_identical, ComparisonEngine};
pub use file_operations::{FileOperations, OverwriteResult};
pub use matcher::{match_trees, MatchedPath, Presence};
pub use scanner::{FolderScanner, ScanOutcome, WalkEvent};
pub use text_diff::{ContentDiff, TextDiffConfig, TextDiffEngine};
