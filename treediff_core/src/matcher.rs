use std::collections::BTreeSet;
use std::path::PathBuf;

/// Where a relative path was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Both,
    OnlyLeft,
    OnlyRight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPath {
    pub relative_path: PathBuf,
    pub presence: Presence,
}

/// Pair up two walks by relative path.
///
/// Output is the union of both sets, sorted by relative path. No file content
/// is touched here.
pub fn match_trees<L, R>(left: L, right: R) -> Vec<MatchedPath>
where
    L: IntoIterator<Item = PathBuf>,
    R: IntoIterator<Item = PathBuf>,
{
    let left: BTreeSet<PathBuf> = left.into_iter().collect();
    let right: BTreeSet<PathBuf> = right.into_iter().collect();

    left.union(&right)
        .map(|path| {
            let presence = match (left.contains(path), right.contains(path)) {
                (true, true) => Presence::Both,
                (true, false) => Presence::OnlyLeft,
                _ => Presence::OnlyRight,
            };
            MatchedPath {
                relative_path: path.clone(),
                presence,
            }
        })
        .collect()
}
