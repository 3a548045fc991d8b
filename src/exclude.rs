//! Field exclusion — path-based filtering of state before persistence.
//!
//! DESIGN
//! ======
//! Exclusion entries are dot-separated paths (`"token"`, `"user.secret"`).
//! An entry excludes its exact path and every path beneath it. Matching is
//! segment-exact: `"user"` covers `"user.profile"` but not `"username"`.
//! Only JSON objects are walked; arrays and scalars are opaque leaves, so
//! paths addressing array elements never match anything.

use serde_json::Value;

use crate::fields::FieldMap;

/// Whether `path` is covered by any entry in `exclude`.
#[must_use]
pub fn is_excluded(path: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|entry| {
        path.strip_prefix(entry.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    })
}

/// Rebuild `fields` without any excluded path.
///
/// Nested objects recurse with the accumulated dot path. A nested object
/// left empty after filtering is dropped entirely rather than persisted as
/// `{}`.
#[must_use]
pub fn filter_excluded(fields: &FieldMap, exclude: &[String]) -> FieldMap {
    filter_at(fields, exclude, "")
}

fn filter_at(fields: &FieldMap, exclude: &[String], parent: &str) -> FieldMap {
    let mut kept = FieldMap::new();
    for (key, value) in fields {
        let path = if parent.is_empty() {
            key.clone()
        } else {
            format!("{parent}.{key}")
        };
        if is_excluded(&path, exclude) {
            continue;
        }
        match value {
            Value::Object(nested) => {
                let filtered = filter_at(nested, exclude, &path);
                if !filtered.is_empty() {
                    kept.insert(key.clone(), Value::Object(filtered));
                }
            }
            leaf => {
                kept.insert(key.clone(), leaf.clone());
            }
        }
    }
    kept
}

#[cfg(test)]
#[path = "exclude_test.rs"]
mod tests;
