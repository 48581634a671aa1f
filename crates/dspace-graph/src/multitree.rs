//! Multi-rooted forest of mounted resources
//!
//! Every node records the set of tree roots that reach it. Adding an edge
//! `start -> end` is legal only if no node in `end`'s subtree already shares a
//! root with `start`; otherwise some root would reach that node twice.

use crate::error::{GraphError, Result};
use dspace_types::{MountStatus, DEFAULT_MOUNT_MODE};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Edge payload mirroring the persisted mount reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEdge {
    pub status: MountStatus,
    pub mode: String,
}

/// Result of a successful [`MultiTree::add_edge`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Added,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    children: BTreeMap<String, ChildEdge>,
    roots: BTreeSet<String>,
}

impl Node {
    fn rooted_at(id: &str) -> Self {
        Self {
            children: BTreeMap::new(),
            roots: BTreeSet::from([id.to_string()]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiTree {
    nodes: BTreeMap<String, Node>,
    /// Ids of the nodes that currently root a tree
    trees: BTreeSet<String>,
}

impl MultiTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a standalone node rooting its own tree. Returns false if it existed.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.nodes.contains_key(id) {
            debug!(node = %id, "node exists");
            return false;
        }
        self.nodes.insert(id.to_string(), Node::rooted_at(id));
        self.trees.insert(id.to_string());
        true
    }

    pub fn add_edge(&mut self, start: &str, end: &str) -> Result<EdgeOutcome> {
        self.add_edge_with(start, end, MountStatus::Active, DEFAULT_MOUNT_MODE)
    }

    pub fn add_edge_with(
        &mut self,
        start: &str,
        end: &str,
        status: MountStatus,
        mode: &str,
    ) -> Result<EdgeOutcome> {
        let start_node = self.node(start)?;
        self.node(end)?;
        if start_node.children.contains_key(end) {
            debug!(start = %start, end = %end, "edge exists");
            return Ok(EdgeOutcome::AlreadyExists);
        }
        let start_roots = start_node.roots.clone();

        let subtree = self.subtree(end);
        for id in &subtree {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if let Some(root) = node.roots.intersection(&start_roots).next() {
                return Err(GraphError::AmbiguousPath {
                    node: id.clone(),
                    root: root.clone(),
                });
            }
        }

        self.node_mut(start)?.children.insert(
            end.to_string(),
            ChildEdge {
                status,
                mode: mode.to_string(),
            },
        );
        self.trees.remove(end);
        for id in &subtree {
            if let Some(node) = self.nodes.get_mut(id) {
                node.roots.remove(end);
                node.roots.extend(start_roots.iter().cloned());
            }
        }

        Ok(EdgeOutcome::Added)
    }

    pub fn remove_edge(&mut self, start: &str, end: &str) -> Result<()> {
        let start_roots = self.node(start)?.roots.clone();
        self.node(end)?;
        if self.node_mut(start)?.children.remove(end).is_none() {
            return Err(GraphError::EdgeNotFound {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let subtree = self.subtree(end);
        for id in &subtree {
            if let Some(node) = self.nodes.get_mut(id) {
                node.roots.retain(|root| !start_roots.contains(root));
            }
        }

        let orphaned = self
            .nodes
            .get(end)
            .map(|node| node.roots.is_empty())
            .unwrap_or(false);
        if orphaned {
            debug!(node = %end, "re-rooting detached subtree");
            self.trees.insert(end.to_string());
            for id in &subtree {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.roots.insert(end.to_string());
                }
            }
        }

        Ok(())
    }

    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        let children: Vec<String> = self.node(id)?.children.keys().cloned().collect();
        for child in children {
            self.remove_edge(id, &child)?;
        }

        for node in self.nodes.values_mut() {
            node.children.remove(id);
        }
        self.nodes.remove(id);
        self.trees.remove(id);
        Ok(())
    }

    pub fn set_edge_status(&mut self, start: &str, end: &str, status: MountStatus) -> Result<()> {
        self.edge_mut(start, end)?.status = status;
        Ok(())
    }

    pub fn set_edge_mode(&mut self, start: &str, end: &str, mode: &str) -> Result<()> {
        self.edge_mut(start, end)?.mode = mode.to_string();
        Ok(())
    }

    fn edge_mut(&mut self, start: &str, end: &str) -> Result<&mut ChildEdge> {
        self.node_mut(start)?
            .children
            .get_mut(end)
            .ok_or_else(|| GraphError::EdgeNotFound {
                start: start.to_string(),
                end: end.to_string(),
            })
    }

    pub fn edge(&self, start: &str, end: &str) -> Option<&ChildEdge> {
        self.nodes.get(start)?.children.get(end)
    }

    pub fn node_exists(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge_exists(&self, start: &str, end: &str) -> bool {
        self.edge(start, end).is_some()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn roots_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(id).map(|node| &node.roots)
    }

    pub fn children_of(&self, id: &str) -> Option<&BTreeMap<String, ChildEdge>> {
        self.nodes.get(id).map(|node| &node.children)
    }

    pub fn tree_roots(&self) -> impl Iterator<Item = &str> {
        self.trees.iter().map(String::as_str)
    }

    /// Number of distinct paths from `root` to `target`, by exhaustive walk
    pub fn path_count(&self, root: &str, target: &str) -> usize {
        self.count_paths(root, target, self.nodes.len())
    }

    fn count_paths(&self, from: &str, target: &str, budget: usize) -> usize {
        if from == target {
            return 1;
        }
        if budget == 0 {
            return 0;
        }
        self.nodes
            .get(from)
            .map(|node| {
                node.children
                    .keys()
                    .map(|child| self.count_paths(child, target, budget - 1))
                    .sum()
            })
            .unwrap_or(0)
    }

    /// `id` and all of its descendants
    fn subtree(&self, id: &str) -> Vec<String> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        let mut out = Vec::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.keys().cloned());
            }
            out.push(current);
        }
        out
    }

    fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn write_branch(&self, f: &mut fmt::Formatter<'_>, id: &str, prefix: &str) -> fmt::Result {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        let count = node.children.len();
        for (i, (child, edge)) in node.children.iter().enumerate() {
            let last = i + 1 == count;
            let marker = if last { "└── " } else { "├── " };
            let suffix = match edge.status {
                MountStatus::Active => "",
                MountStatus::Inactive => " (inactive)",
            };
            writeln!(f, "{}{}{}{}", prefix, marker, child, suffix)?;
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            self.write_branch(f, child, &next)?;
        }
        Ok(())
    }
}

impl fmt::Display for MultiTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in &self.trees {
            writeln!(f, "{}", root)?;
            self.write_branch(f, root, "")?;
            writeln!(f)?;
        }
        Ok(())
    }
}
