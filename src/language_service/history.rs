//! Navigation history for reference searches
//!
//! Each find-references run pushes one set. Picking an entry only moves the
//! selection marker; popping returns to the previous search.

use serde::{Deserialize, Serialize};

use super::references::{Reference, ReferenceTarget};

const MAX_DEPTH: usize = 32;

/// Result of one find-references run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub target: ReferenceTarget,
    pub references: Vec<Reference>,
    pub last_selected: Option<usize>,
}

impl ReferenceSet {
    pub fn new(target: ReferenceTarget, references: Vec<Reference>) -> Self {
        Self {
            target,
            references,
            last_selected: None,
        }
    }

    pub fn title(&self) -> String {
        self.target.title()
    }

    pub fn selected(&self) -> Option<&Reference> {
        self.last_selected.and_then(|i| self.references.get(i))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationHistory {
    sets: Vec<ReferenceSet>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest set is dropped once the stack is full
    pub fn push(&mut self, set: ReferenceSet) {
        if self.sets.len() == MAX_DEPTH {
            self.sets.remove(0);
        }
        self.sets.push(set);
    }

    pub fn top(&self) -> Option<&ReferenceSet> {
        self.sets.last()
    }

    pub fn pop(&mut self) -> Option<ReferenceSet> {
        self.sets.pop()
    }

    /// Mark an entry of the top set as chosen and return it
    pub fn select(&mut self, index: usize) -> Option<&Reference> {
        let top = self.sets.last_mut()?;
        if index >= top.references.len() {
            return None;
        }
        top.last_selected = Some(index);
        top.references.get(index)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language_service::document::Location;

    fn reference(file: &str, line: usize) -> Reference {
        Reference {
            location: Location {
                file_path: file.to_string(),
                line,
                character: 0,
            },
            preview: String::new(),
        }
    }

    fn set(function: &str, refs: usize) -> ReferenceSet {
        ReferenceSet::new(
            ReferenceTarget::new("ns", function),
            (0..refs).map(|i| reference("a.js", i)).collect(),
        )
    }

    #[test]
    fn test_push_select_pop() {
        let mut history = NavigationHistory::new();
        assert!(history.top().is_none());

        history.push(set("first", 2));
        history.push(set("second", 3));
        assert_eq!(history.len(), 2);
        assert_eq!(history.top().unwrap().title(), "ns.second");

        assert_eq!(history.select(2).map(|r| r.location.line), Some(2));
        assert_eq!(history.top().unwrap().last_selected, Some(2));
        assert!(history.select(3).is_none());
        assert_eq!(history.top().unwrap().last_selected, Some(2));

        let popped = history.pop().unwrap();
        assert_eq!(popped.selected().map(|r| r.location.line), Some(2));
        assert_eq!(history.top().unwrap().title(), "ns.first");
        assert_eq!(history.top().unwrap().last_selected, None);
    }

    #[test]
    fn test_depth_is_capped() {
        let mut history = NavigationHistory::new();
        for i in 0..MAX_DEPTH + 5 {
            history.push(set(&format!("f{}", i), 1));
        }

        assert_eq!(history.len(), MAX_DEPTH);
        assert_eq!(history.top().unwrap().title(), format!("ns.f{}", MAX_DEPTH + 4));
    }
}
