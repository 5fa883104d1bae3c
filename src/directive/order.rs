//! Ordering core of the directive walk.
//!
//! Both functions are pure over a callback, so cycles and tree ordering can
//! be tested without touching the filesystem.

use std::hash::Hash;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// One entry of a file's expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<N> {
    /// Bundle this node (and what it requires) here.
    Child(N),
    /// Splice the expanding file's own body here.
    SelfBody,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

struct Frame<N> {
    node: N,
    steps: Vec<Step<N>>,
    pos: usize,
    emitted: bool,
}

/// Bundle order starting at `root`.
///
/// Every reachable node appears exactly once, at the position where it was
/// first reached. A node's own body goes at its [`Step::SelfBody`] or after
/// its children when it has none. Reaching a node that is still being
/// expanded (a cycle) is skipped, so `A → B → C → A` from `A` yields
/// `C, B, A`.
pub fn bundle_order<N, E, F>(root: N, mut expand: F) -> Result<Vec<N>, E>
where
    N: Clone + Eq + Hash,
    F: FnMut(&N) -> Result<Vec<Step<N>>, E>,
{
    let mut visits: FxHashMap<N, Visit> = FxHashMap::default();
    let mut out = Vec::new();

    visits.insert(root.clone(), Visit::InProgress);
    let steps = expand(&root)?;
    let mut stack = vec![Frame {
        node: root,
        steps,
        pos: 0,
        emitted: false,
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(step) = frame.steps.get(frame.pos).cloned() else {
            let Some(frame) = stack.pop() else { break };
            if !frame.emitted {
                out.push(frame.node.clone());
            }
            visits.insert(frame.node, Visit::Done);
            continue;
        };
        frame.pos += 1;

        match step {
            Step::SelfBody => {
                if !frame.emitted {
                    frame.emitted = true;
                    out.push(frame.node.clone());
                }
            }
            Step::Child(child) => {
                if visits.contains_key(&child) {
                    continue;
                }
                visits.insert(child.clone(), Visit::InProgress);
                let steps = expand(&child)?;
                stack.push(Frame {
                    node: child,
                    steps,
                    pos: 0,
                    emitted: false,
                });
            }
        }
    }

    debug_assert!(visits.values().all(|v| *v == Visit::Done));
    Ok(out)
}

/// A directory entry as seen by [`tree_order`]: name and whether it is a directory.
pub type Entry = (String, bool);

/// Files under `dir` in `require_tree` / `require_directory` order.
///
/// Within each directory: files alphabetically, then subdirectories
/// alphabetically (each recursively when `recursive`), then the directory's
/// index file last. Without `recursive` only the immediate files are
/// returned, alphabetically.
pub fn tree_order<L, I>(dir: &Path, recursive: bool, mut list: L, is_index: I) -> Vec<PathBuf>
where
    L: FnMut(&Path) -> Vec<Entry>,
    I: Fn(&str) -> bool,
{
    enum Work {
        Dir(PathBuf),
        File(PathBuf),
    }

    let mut out = Vec::new();
    let mut stack = vec![Work::Dir(dir.to_path_buf())];

    while let Some(work) = stack.pop() {
        let dir = match work {
            Work::File(path) => {
                out.push(path);
                continue;
            }
            Work::Dir(dir) => dir,
        };

        let mut entries = list(&dir);
        entries.sort();

        if !recursive {
            out.extend(
                entries
                    .into_iter()
                    .filter(|(_, is_dir)| !is_dir)
                    .map(|(name, _)| dir.join(name)),
            );
            continue;
        }

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        let mut index = Vec::new();
        for (name, is_dir) in entries {
            let path = dir.join(&name);
            if is_dir {
                subdirs.push(Work::Dir(path));
            } else if is_index(&name) {
                index.push(Work::File(path));
            } else {
                files.push(Work::File(path));
            }
        }

        let ordered: Vec<Work> = files.into_iter().chain(subdirs).chain(index).collect();
        stack.extend(ordered.into_iter().rev());
    }

    out
}
