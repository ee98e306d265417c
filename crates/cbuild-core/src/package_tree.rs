//! Path-segment trie over package roots.
//!
//! Answers "which package contains this path" by walking the path one
//! segment at a time and keeping the deepest node marked with a package.

use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, Node>,
    name: Option<String>,
}

/// A package found to contain a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner<'a> {
    /// Package name marked on the root node.
    pub name: &'a str,
    /// URL-style root path of the package.
    pub root: String,
}

/// Trie of URL-style package root paths.
#[derive(Debug, Default)]
pub struct PackageTree {
    root: Node,
}

impl PackageTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `root_path` as the root of package `name`.
    ///
    /// Empty root paths are ignored.
    pub fn insert(&mut self, root_path: &str, name: &str) {
        let mut node = &mut self.root;
        let mut any = false;

        for segment in segments(root_path) {
            node = node.children.entry(segment.to_string()).or_default();
            any = true;
        }

        if any {
            node.name = Some(name.to_string());
        }
    }

    /// Deepest package whose root is `path` or one of its ancestors.
    #[must_use]
    pub fn owner(&self, path: &str) -> Option<Owner<'_>> {
        let mut node = &self.root;
        let mut walked: Vec<&str> = Vec::new();
        let mut found = None;

        for segment in segments(path) {
            let Some(child) = node.children.get(segment) else {
                break;
            };
            node = child;
            walked.push(segment);

            if let Some(name) = &node.name {
                found = Some(Owner {
                    name,
                    root: walked.join("/"),
                });
            }
        }

        found
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}
