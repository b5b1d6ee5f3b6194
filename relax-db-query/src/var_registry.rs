//! Variable registry for query execution
//!
//! Maps variable names (e.g., "?s", "?name") to compact `VarId` indices.
//! Answers, patterns, and join conditions refer to variables by `VarId`;
//! names are only needed again when rendering results.

use std::collections::HashMap;
use std::sync::Arc;

/// Compact variable identifier
///
/// u16 supports up to 65K variables per query (far beyond any triple-pattern query).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u16);

impl VarId {
    /// Get the underlying index value
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registry mapping variable names to compact VarId indices
#[derive(Debug, Default, Clone)]
pub struct VarRegistry {
    name_to_id: HashMap<Arc<str>, VarId>,
    id_to_name: Vec<Arc<str>>,
}

impl VarRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get existing VarId or insert a new one
    pub fn get_or_insert(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        // VarId is u16; wrapping would silently alias two variables.
        if self.id_to_name.len() >= (u16::MAX as usize) {
            panic!(
                "VarRegistry capacity exceeded ({}). VarId is u16; refusing to wrap.",
                self.id_to_name.len()
            );
        }

        let id = VarId(self.id_to_name.len() as u16);
        let arc_name: Arc<str> = Arc::from(name);
        self.name_to_id.insert(arc_name.clone(), id);
        self.id_to_name.push(arc_name);
        id
    }

    /// Get the VarId for a name, if it exists
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.name_to_id.get(name).copied()
    }

    /// Get the name for a VarId, falling back to a positional label for
    /// ids minted outside this registry
    pub fn display(&self, id: VarId) -> String {
        match self.id_to_name.get(id.index()) {
            Some(name) => name.to_string(),
            None => format!("?_{}", id.0),
        }
    }

    /// Get the number of registered variables
    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_insert_is_stable() {
        let mut reg = VarRegistry::new();

        let x = reg.get_or_insert("?x");
        let y = reg.get_or_insert("?y");
        assert_ne!(x, y);
        assert_eq!(reg.get_or_insert("?x"), x);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_display_unknown_id() {
        let mut reg = VarRegistry::new();
        let x = reg.get_or_insert("?x");

        assert_eq!(reg.display(x), "?x");
        assert_eq!(reg.display(VarId(7)), "?_7");
    }
}
