use std::collections::HashSet;

use crate::model::work_item::WorkItem;

/// Receives every reconciled item list, in order.
pub trait RenderSink: Send + Sync {
    fn send(&self, items: Vec<WorkItem>);
}

/// Flag items whose ids were not part of the previous render.
///
/// Returns the flagged items and the id set to compare the next render with.
/// Pure: nothing is kept between calls.
pub fn reconcile(
    fresh: Vec<WorkItem>,
    previously_rendered: &HashSet<u32>,
) -> (Vec<WorkItem>, HashSet<u32>) {
    let mut rendered = HashSet::with_capacity(fresh.len());
    let items = fresh
        .into_iter()
        .map(|mut item| {
            item.is_new = !previously_rendered.contains(&item.id);
            rendered.insert(item.id);
            item
        })
        .collect();
    (items, rendered)
}

/// Owns the rendered-id set for one view and pushes reconciled lists to a sink.
///
/// The set is replaced wholesale on each render, so ids that disappear and
/// come back are flagged again.
pub struct ViewReconciler<S: RenderSink> {
    sink: S,
    rendered: HashSet<u32>,
}

impl<S: RenderSink> ViewReconciler<S> {
    /// A fresh view: the first render flags every item.
    pub fn new(sink: S) -> Self {
        Self::seeded(sink, HashSet::new())
    }

    /// A view that has already shown `rendered`.
    pub fn seeded(sink: S, rendered: HashSet<u32>) -> Self {
        Self { sink, rendered }
    }

    /// Reconcile and send; returns how many items were flagged new.
    pub fn render(&mut self, fresh: Vec<WorkItem>) -> usize {
        let (items, rendered) = reconcile(fresh, &self.rendered);
        self.rendered = rendered;
        let new_count = items.iter().filter(|item| item.is_new).count();
        self.sink.send(items);
        new_count
    }

    /// Treat `ids` as already shown, so the next render only flags items
    /// outside it. Used when a filter change swaps the whole list.
    pub fn mark_rendered(&mut self, ids: HashSet<u32>) {
        self.rendered = ids;
    }

    /// Forget what was shown, e.g. after switching projects.
    pub fn reset(&mut self) {
        self.rendered.clear();
    }
}
