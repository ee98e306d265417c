//! Dependency tree extraction for diagnostic output.
//!
//! Reduces the engine's module graph to a tree in which every module
//! appears once, under the importer through which a breadth-first walk
//! from the entry points first reached it.

use crate::engine::BuildResult;
use std::collections::{HashSet, VecDeque};

/// A node of the dependency tree. The root has no name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branch {
    pub name: Option<String>,
    pub children: Vec<Branch>,
}

impl Branch {
    /// Number of named nodes in this subtree.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.name.is_some()) + self.children.iter().map(Branch::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extract the shortest-import-path tree of a build result.
#[must_use]
pub fn extract_tree(result: &BuildResult) -> Branch {
    // Arena of (name, child ids); id 0 is the root.
    let mut arena: Vec<(Option<String>, Vec<usize>)> = vec![(None, Vec::new())];
    let mut found: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for entry in entry_points(result) {
        if found.insert(entry.clone()) {
            arena.push((Some(entry), Vec::new()));
            let id = arena.len() - 1;
            arena[0].1.push(id);
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        let Some(item) = arena[id].0.as_ref().and_then(|name| result.tree.get(name)) else {
            continue;
        };

        for dep in &item.deps {
            let target = item.dep_map.get(dep).unwrap_or(dep);
            if !result.tree.contains_key(target) || !found.insert(target.clone()) {
                continue;
            }
            arena.push((Some(target.clone()), Vec::new()));
            let child = arena.len() - 1;
            arena[id].1.push(child);
            queue.push_back(child);
        }
    }

    assemble(&arena, 0)
}

/// Declared entry points, or every module no other module imports.
fn entry_points(result: &BuildResult) -> Vec<String> {
    if let Some(entries) = &result.entry_points {
        return entries.clone();
    }

    let referenced: HashSet<&String> = result
        .tree
        .values()
        .flat_map(|item| {
            item.deps
                .iter()
                .map(|dep| item.dep_map.get(dep).unwrap_or(dep))
        })
        .collect();

    result
        .tree
        .keys()
        .filter(|name| !referenced.contains(name))
        .cloned()
        .collect()
}

fn assemble(arena: &[(Option<String>, Vec<usize>)], id: usize) -> Branch {
    let (name, children) = &arena[id];
    Branch {
        name: name.clone(),
        children: children.iter().map(|&c| assemble(arena, c)).collect(),
    }
}
