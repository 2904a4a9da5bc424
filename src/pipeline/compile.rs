use serde_json::{json, Value};

use super::resolve::ParentResolution;
use crate::model::patch::{PatchOp, PatchOperation};
use crate::model::remote::{KnownField, Relation, RemoteFields, HIERARCHY_PARENT};
use crate::model::work_item::{WorkItem, UNASSIGNED};

fn known_values(item: &WorkItem) -> Vec<(KnownField, Option<Value>)> {
    let non_blank = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Value::String(v.to_string()))
    };
    let assignee = item.assigned_to.as_deref().map(str::trim).and_then(|a| {
        if a.eq_ignore_ascii_case(UNASSIGNED) {
            Some(Value::String(String::new()))
        } else if a.is_empty() {
            None
        } else {
            Some(Value::String(a.to_string()))
        }
    });
    vec![
        (KnownField::Title, non_blank(Some(&item.title))),
        (KnownField::State, non_blank(item.state.as_deref())),
        (
            KnownField::WorkItemType,
            item.item_type.as_ref().map(|t| Value::String(t.as_str().to_string())),
        ),
        (KnownField::AssignedTo, assignee),
    ]
}

/// Compile a canonical item into patch operations against the record's
/// current remote state.
///
/// Field writes come first: `replace` where the remote already holds a
/// non-empty value, `add` otherwise. Clearing the assignee on a record that
/// has none is skipped. Parent changes follow as relation operations; removals
/// use descending indices so the patch holds whether the store applies it in
/// sequence or against the original list.
pub fn compile(
    item: &WorkItem,
    parent: &ParentResolution,
    existing: &RemoteFields,
    relations: &[Relation],
    item_url: &dyn Fn(u32) -> String,
) -> Vec<PatchOperation> {
    let mut ops = Vec::new();

    for (field, value) in known_values(item) {
        let Some(value) = value else { continue };
        let name = field.remote_name();
        let populated = existing.is_populated(name);
        if field == KnownField::AssignedTo && value == Value::String(String::new()) && !populated {
            continue;
        }
        ops.push(field_op(name, value, populated));
    }

    for (name, value) in &item.fields {
        if value.is_null() || KnownField::from_remote_name(name).is_some() {
            continue;
        }
        ops.push(field_op(name, value.clone(), existing.is_populated(name)));
    }

    if let Some(target) = parent.target() {
        ops.extend(relation_ops(target, relations, item_url));
    }
    ops
}

fn field_op(name: &str, value: Value, populated: bool) -> PatchOperation {
    let op = if populated { PatchOp::Replace } else { PatchOp::Add };
    PatchOperation::field(op, name, value)
}

fn relation_ops(
    target: Option<u32>,
    relations: &[Relation],
    item_url: &dyn Fn(u32) -> String,
) -> Vec<PatchOperation> {
    let parents: Vec<(usize, Option<u32>)> = relations
        .iter()
        .enumerate()
        .filter(|(_, relation)| relation.is_hierarchy_parent())
        .map(|(index, relation)| (index, relation.target_id()))
        .collect();

    if let (Some(id), [(_, current)]) = (target, parents.as_slice()) {
        if *current == Some(id) {
            return Vec::new();
        }
    }

    let mut ops: Vec<PatchOperation> = parents
        .iter()
        .rev()
        .map(|(index, _)| PatchOperation::remove_relation(*index))
        .collect();
    if let Some(id) = target {
        ops.push(PatchOperation::add_relation(json!({
            "rel": HIERARCHY_PARENT,
            "url": item_url(id),
        })));
    }
    ops
}
