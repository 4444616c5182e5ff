//! Employee change detection: a declarative table of tracked fields so adding
//! one means adding one row here, not touching call sites.

use std::collections::HashSet;

use crate::types::Employee;

/// Snapshot of one tracked field's value. Lists compare as sets: the source
/// does not guarantee ordering of phone/mobile cells between observations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    fn differs(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a != b,
            (FieldValue::List(a), FieldValue::List(b)) => {
                let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
                let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
                sa != sb
            }
            _ => true,
        }
    }

    /// History representation: lists are comma-joined.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(l) => l.join(","),
        }
    }
}

type Extract = fn(&Employee) -> FieldValue;

/// Every field whose change produces a history row.
pub const TRACKED_FIELDS: &[(&str, Extract)] = &[
    ("name", |e| FieldValue::Text(e.name.clone())),
    ("phone", |e| FieldValue::List(e.phone.clone())),
    ("mobile", |e| FieldValue::List(e.mobile.clone())),
    ("email", |e| FieldValue::Text(e.email.clone())),
    ("avatar", |e| FieldValue::Text(e.avatar.clone())),
    ("grade", |e| FieldValue::Text(e.grade.clone())),
    ("parent", |e| FieldValue::Text(e.parent_idr.clone())),
];

/// A tracked field that changed between the stored and the re-observed
/// employee. `old_value` is what the store held before.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old_value: String,
}

/// Compare `old` (stored) against `new` (freshly observed) across the tracked
/// fields. Empty result means the observation is identical.
pub fn diff_employees(old: &Employee, new: &Employee) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (field, extract) in TRACKED_FIELDS {
        let old_val = extract(old);
        if old_val.differs(&extract(new)) {
            changes.push(FieldChange {
                field,
                old_value: old_val.render(),
            });
        }
    }
    changes
}
