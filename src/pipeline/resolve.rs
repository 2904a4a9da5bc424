use crate::model::work_item::{ParentRef, WorkItem};

/// What a mutation wants done with an item's parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentResolution {
    /// Parent was not mentioned; leave links alone.
    Unchanged,
    /// Explicit request to remove the parent.
    Clear,
    Set(u32),
    /// A title that matched nothing. Treated as a clear, with a warning.
    Missing(String),
}

impl ParentResolution {
    /// `None` leaves relations untouched; `Some(None)` removes the parent.
    pub fn target(&self) -> Option<Option<u32>> {
        match self {
            ParentResolution::Unchanged => None,
            ParentResolution::Clear | ParentResolution::Missing(_) => Some(None),
            ParentResolution::Set(id) => Some(Some(*id)),
        }
    }
}

/// First snapshot item whose title matches exactly.
pub fn find_by_title<'a>(items: &'a [WorkItem], title: &str) -> Option<&'a WorkItem> {
    items.iter().find(|item| item.id != 0 && item.title == title)
}

fn numeric_reference(title: &str) -> Option<u32> {
    title.trim().trim_start_matches('#').parse().ok()
}

/// Turn an item's parent reference into a concrete parent id.
///
/// Titles match exactly against the snapshot. A title that misses but reads
/// as the id of a snapshot item (`"42"`, `"#42"`) resolves to that item.
pub fn resolve_parent(item: &WorkItem, all_items: &[WorkItem]) -> ParentResolution {
    match &item.parent {
        ParentRef::Unspecified => ParentResolution::Unchanged,
        ParentRef::Cleared => ParentResolution::Clear,
        ParentRef::Id(id) => ParentResolution::Set(*id),
        ParentRef::Title(title) => {
            if let Some(parent) = find_by_title(all_items, title) {
                return ParentResolution::Set(parent.id);
            }
            match numeric_reference(title) {
                Some(id) if all_items.iter().any(|candidate| candidate.id == id) => {
                    ParentResolution::Set(id)
                }
                _ => ParentResolution::Missing(title.clone()),
            }
        }
    }
}

/// The id an update or delete applies to: the payload's id, or the snapshot
/// item with the same title when the id was left out.
pub fn resolve_target_id(item: &WorkItem, all_items: &[WorkItem]) -> Option<u32> {
    if item.id != 0 {
        return Some(item.id);
    }
    find_by_title(all_items, item.title.trim()).map(|found| found.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Vec<WorkItem> {
        vec![
            WorkItem::new("Checkout").with_id(5),
            WorkItem::new("Checkout").with_id(9),
            WorkItem::new("Payments").with_id(42),
        ]
    }

    fn with_parent(parent: ParentRef) -> WorkItem {
        WorkItem::new("Pay button").with_parent(parent)
    }

    #[test]
    fn title_resolves_to_first_exact_match() {
        let item = with_parent(ParentRef::Title("Checkout".into()));
        assert_eq!(resolve_parent(&item, &snapshot()), ParentResolution::Set(5));
    }

    #[test]
    fn title_match_is_exact() {
        let item = with_parent(ParentRef::Title("checkout".into()));
        assert_eq!(
            resolve_parent(&item, &snapshot()),
            ParentResolution::Missing("checkout".into())
        );
    }

    #[test]
    fn numeric_title_falls_back_to_id() {
        let item = with_parent(ParentRef::Title("#42".into()));
        assert_eq!(resolve_parent(&item, &snapshot()), ParentResolution::Set(42));

        let unknown = with_parent(ParentRef::Title("77".into()));
        assert_eq!(
            resolve_parent(&unknown, &snapshot()),
            ParentResolution::Missing("77".into())
        );
    }

    #[test]
    fn ids_and_clears_pass_through() {
        assert_eq!(
            resolve_parent(&with_parent(ParentRef::Id(300)), &[]),
            ParentResolution::Set(300)
        );
        assert_eq!(
            resolve_parent(&with_parent(ParentRef::Cleared), &[]),
            ParentResolution::Clear
        );
        assert_eq!(
            resolve_parent(&with_parent(ParentRef::Unspecified), &[]),
            ParentResolution::Unchanged
        );
    }

    #[test]
    fn missing_parent_targets_removal() {
        assert_eq!(ParentResolution::Missing("x".into()).target(), Some(None));
        assert_eq!(ParentResolution::Unchanged.target(), None);
        assert_eq!(ParentResolution::Set(3).target(), Some(Some(3)));
    }

    #[test]
    fn target_id_falls_back_to_title() {
        let item = WorkItem::new("Payments");
        assert_eq!(resolve_target_id(&item, &snapshot()), Some(42));
        assert_eq!(resolve_target_id(&WorkItem::new("Nope"), &snapshot()), None);
        assert_eq!(resolve_target_id(&item.with_id(8), &snapshot()), Some(8));
    }
}
