//! Conservative duplicate detection.
//!
//! Two items are duplicates only when their titles mean the same thing after
//! normalization: case, filler words, plurals, and verb synonyms are ignored,
//! and the remaining word sets must overlap almost entirely. When in doubt,
//! nothing is marked.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::model::mutation::{MutationAction, MutationBatch};
use crate::model::work_item::WorkItem;

/// Minimum Jaccard overlap between normalized title word sets.
pub const EQUIVALENCE_THRESHOLD: f64 = 0.8;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "at", "with", "and", "or", "new", "our",
    "my", "some", "all",
];

const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "add",
        &["add", "implement", "create", "build", "introduce", "support", "enable", "make"],
    ),
    ("fix", &["fix", "resolve", "repair", "correct", "patch"]),
    (
        "update",
        &["update", "change", "modify", "adjust", "improve", "refactor", "rework"],
    ),
    ("remove", &["remove", "delete", "drop", "eliminate"]),
    ("test", &["test", "tests", "verify", "validate", "check"]),
    ("doc", &["doc", "docs", "document", "documentation"]),
];

fn canonical(word: &str) -> String {
    if let Some((canonical, _)) = SYNONYMS.iter().find(|(_, words)| words.contains(&word)) {
        return (*canonical).to_string();
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

pub fn title_tokens(title: &str) -> BTreeSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .map(|word| canonical(&word))
        .collect()
}

pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (title_tokens(a), title_tokens(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    shared as f64 / total as f64
}

pub fn titles_equivalent(a: &str, b: &str) -> bool {
    similarity(a, b) >= EQUIVALENCE_THRESHOLD
}

/// Same meaning and, when both types are known, the same type.
pub fn are_duplicates(a: &WorkItem, b: &WorkItem) -> bool {
    if let (Some(a_type), Some(b_type)) = (&a.item_type, &b.item_type) {
        if a_type != b_type {
            return false;
        }
    }
    titles_equivalent(&a.title, &b.title)
}

/// True when the instruction asks for duplicate cleanup.
pub fn mentions_duplicates(instruction: &str) -> bool {
    let lower = instruction.to_lowercase();
    ["duplicate", "dupe", "dedup"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn deletion_payload(item: &WorkItem) -> WorkItem {
    WorkItem::new(item.title.clone()).with_id(item.id)
}

/// Every snapshot item that duplicates an item with a lower id.
///
/// The lowest-id member of each group survives.
pub fn find_duplicates(items: &[WorkItem]) -> Vec<WorkItem> {
    let mut sorted: Vec<&WorkItem> = items.iter().filter(|item| item.id != 0).collect();
    sorted.sort_by_key(|item| item.id);

    let mut keepers: Vec<&WorkItem> = Vec::new();
    let mut duplicates = Vec::new();
    for item in sorted {
        match keepers.iter().find(|keeper| are_duplicates(keeper, item)) {
            Some(keeper) => {
                debug!(id = item.id, keeper = keeper.id, title = %item.title, "duplicate found");
                duplicates.push(deletion_payload(item));
            }
            None => keepers.push(item),
        }
    }
    duplicates
}

/// A `batch-delete` that removes every duplicate in the snapshot.
pub fn duplicate_batch(items: &[WorkItem]) -> MutationBatch {
    MutationBatch::new(MutationAction::BatchDelete, find_duplicates(items))
}

/// Filter proposed deletions down to real duplicates.
///
/// A candidate stays only if the snapshot holds an equivalent item with a
/// lower id that is not itself being deleted. Candidates are matched to the
/// snapshot by id, or by exact title when the id is missing.
pub fn retain_true_duplicates(candidates: Vec<WorkItem>, snapshot: &[WorkItem]) -> Vec<WorkItem> {
    let by_id: HashMap<u32, &WorkItem> = snapshot.iter().map(|item| (item.id, item)).collect();
    let current: Vec<&WorkItem> = candidates
        .iter()
        .filter_map(|candidate| match by_id.get(&candidate.id) {
            Some(item) => Some(*item),
            None => snapshot
                .iter()
                .find(|item| candidate.id == 0 && item.title == candidate.title.trim()),
        })
        .collect();
    let doomed: HashSet<u32> = current.iter().map(|item| item.id).collect();

    current
        .into_iter()
        .filter(|item| {
            let keeper = snapshot.iter().find(|other| {
                other.id < item.id && !doomed.contains(&other.id) && are_duplicates(other, item)
            });
            if keeper.is_none() {
                debug!(id = item.id, title = %item.title, "dropping deletion with no surviving original");
            }
            keeper.is_some()
        })
        .map(deletion_payload)
        .collect()
}
