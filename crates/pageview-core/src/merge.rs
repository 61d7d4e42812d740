use std::collections::HashSet;

use crate::state::Section;
use crate::state::SectionId;

/// Ordered union of `existing` and `incoming` keyed by section id.
///
/// The first occurrence of an id keeps its position and contents, so re-applying a page that was
/// already merged returns the same list.
pub fn merge_sections(existing: &[Section], incoming: &[Section]) -> Vec<Section> {
    let mut seen: HashSet<&SectionId> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());
    for section in existing.iter().chain(incoming.iter()) {
        if seen.insert(&section.id) {
            merged.push(section.clone());
        }
    }
    merged
}
