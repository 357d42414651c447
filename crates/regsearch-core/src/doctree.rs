//! Hierarchical document model.
//!
//! A `DocTree` is stored as an arena of nodes; callers address sections by a
//! `TreeIndex` (the child positions walked from the root), never by reference.
//! The nested `Section` type is the persisted form and the shape produced by
//! the offline parser. Consolidation passes convert to the nested form, merge,
//! and rebuild the arena so no index mapping is ever patched in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

pub type Meta = BTreeMap<String, serde_json::Value>;

type NodeId = usize;

/// Path of child positions from the root. The empty path is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeIndex(Vec<usize>);

impl TreeIndex {
    pub fn root() -> Self { Self(Vec::new()) }

    pub fn new(path: Vec<usize>) -> Self { Self(path) }

    pub fn as_slice(&self) -> &[usize] { &self.0 }

    pub fn is_root(&self) -> bool { self.0.is_empty() }

    pub fn depth(&self) -> usize { self.0.len() }

    pub fn child(&self, position: usize) -> Self {
        let mut path = self.0.clone();
        path.push(position);
        Self(path)
    }

    /// Parent index; `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() { return None; }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Strict ancestry: an index is not its own ancestor.
    pub fn is_ancestor_of(&self, other: &TreeIndex) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl From<Vec<usize>> for TreeIndex {
    fn from(path: Vec<usize>) -> Self { Self(path) }
}

impl fmt::Display for TreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() { return write!(f, "root"); }
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Parent of `index`, or `None` when `index` is the root.
pub fn move_up(index: &TreeIndex) -> Option<TreeIndex> { index.parent() }

/// Persisted, nested form of a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub contents: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Meta,
    #[serde(default)]
    pub children: Vec<Section>,
}

impl Section {
    pub fn new(title: impl Into<String>, contents: Vec<String>) -> Self {
        Self { title: title.into(), contents, ..Default::default() }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Section>) -> Self {
        self.children = children;
        self
    }

    fn char_len(&self) -> usize {
        self.title.chars().count() + self.contents.iter().map(|c| c.chars().count()).sum::<usize>()
    }
}

/// One arena slot. Children are arena ids in document order.
#[derive(Debug, Clone)]
pub struct SectionNode {
    pub title: String,
    pub contents: Vec<String>,
    pub metadata: Meta,
    children: Vec<NodeId>,
}

impl SectionNode {
    pub fn child_count(&self) -> usize { self.children.len() }

    pub fn is_leaf(&self) -> bool { self.children.is_empty() }

    /// Heading plus own paragraphs, used when a section is shown as context.
    pub fn text(&self) -> String {
        if self.contents.is_empty() { return self.title.clone(); }
        format!("{}\n{}", self.title, self.contents.join("\n"))
    }
}

/// A paragraph yielded by [`DocTree::flatten`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatParagraph<'a> {
    pub tree_index: TreeIndex,
    pub paragraph_index: usize,
    pub text: &'a str,
}

/// One level of surrounding context for a section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedContext {
    pub supersection: Option<String>,
    pub subsection: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocTree {
    nodes: Vec<SectionNode>,
}

impl DocTree {
    pub fn from_section(root: Section) -> Self {
        let mut nodes = Vec::new();
        push_section(&mut nodes, root);
        Self { nodes }
    }

    /// Build a tree from the parser's flat section list. A section at level `n`
    /// becomes a child of the closest preceding section with a smaller level;
    /// level 1 sections hang off the root.
    pub fn from_sections(title: impl Into<String>, sections: Vec<Section>, levels: &[usize]) -> Result<Self> {
        if sections.len() != levels.len() {
            return Err(Error::InvalidConfig(format!("{} sections but {} levels", sections.len(), levels.len())));
        }
        let mut nodes = vec![SectionNode { title: title.into(), contents: Vec::new(), metadata: Meta::new(), children: Vec::new() }];
        let mut open: Vec<(usize, NodeId)> = vec![(0, 0)];
        for (section, &level) in sections.into_iter().zip(levels.iter()) {
            while open.last().is_some_and(|(l, _)| *l >= level.max(1)) { open.pop(); }
            let parent = open.last().map(|(_, id)| *id).unwrap_or(0);
            let id = push_section(&mut nodes, section);
            nodes[parent].children.push(id);
            open.push((level.max(1), id));
        }
        Ok(Self { nodes })
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read document tree {}: {}", path.display(), e))?;
        let root: Section = serde_json::from_str(&raw)?;
        Ok(Self::from_section(root))
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(&self.to_section())?)?;
        Ok(())
    }

    pub fn to_section(&self) -> Section { self.section_at(0) }

    pub fn title(&self) -> &str { &self.nodes[0].title }

    pub fn section_count(&self) -> usize { self.nodes.len() }

    pub fn paragraph_count(&self) -> usize { self.nodes.iter().map(|n| n.contents.len()).sum() }

    /// Section at `index`, failing with `IndexOutOfRange` past the end.
    pub fn get_node(&self, index: &TreeIndex) -> Result<&SectionNode> {
        self.find(index).ok_or_else(|| Error::IndexOutOfRange(index.clone()))
    }

    pub fn find(&self, index: &TreeIndex) -> Option<&SectionNode> {
        self.resolve(index).map(|id| &self.nodes[id])
    }

    fn resolve(&self, index: &TreeIndex) -> Option<NodeId> {
        let mut id = 0;
        for &position in index.as_slice() {
            id = *self.nodes[id].children.get(position)?;
        }
        Some(id)
    }

    /// Depth-first walk yielding every paragraph in document order. Lazy and
    /// restartable: each call starts a fresh walk.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten { tree: self, stack: vec![(0, TreeIndex::root())], current: None }
    }

    /// Text of the enclosing section, unless the enclosing section is the root.
    pub fn supersection(&self, index: &TreeIndex) -> Option<String> {
        let parent = move_up(index)?;
        if parent.is_root() { return None; }
        self.find(&parent).map(SectionNode::text)
    }

    /// Text of the first child section, if any.
    pub fn subsection(&self, index: &TreeIndex) -> Option<String> {
        let node = self.find(index)?;
        node.children.first().map(|&c| self.nodes[c].text())
    }

    pub fn expand_context(&self, index: &TreeIndex) -> ExpandedContext {
        ExpandedContext { supersection: self.supersection(index), subsection: self.subsection(index) }
    }

    /// `text` wrapped with one level of surrounding context.
    pub fn expand(&self, text: &str, index: &TreeIndex) -> String {
        let ctx = self.expand_context(index);
        let mut out = String::new();
        if let Some(sup) = ctx.supersection { out.push_str(&sup); out.push_str("\n\n"); }
        out.push_str(text);
        if let Some(sub) = ctx.subsection { out.push_str("\n\n"); out.push_str(&sub); }
        out
    }

    /// Titles from the top-level section down to `index`, root excluded.
    pub fn breadcrumbs(&self, index: &TreeIndex) -> Vec<String> {
        let mut headings = Vec::new();
        let mut cursor = Some(index.clone());
        while let Some(current) = cursor {
            if current.is_root() { break; }
            if let Some(node) = self.find(&current) { headings.push(node.title.clone()); }
            cursor = move_up(&current);
        }
        headings.reverse();
        headings
    }

    /// Merge leaf sections shorter than `min_chars` into the preceding sibling
    /// when that sibling is itself a leaf. Order is preserved.
    pub fn consolidate_leaves(&self, min_chars: usize) -> Self {
        let mut root = self.to_section();
        merge_small_leaves(&mut root, min_chars);
        Self::from_section(root)
    }

    /// Merge short paragraphs into their neighbours within each section.
    pub fn consolidate_paragraphs(&self, min_chars: usize) -> Self {
        let mut root = self.to_section();
        merge_short_paragraphs(&mut root, min_chars);
        Self::from_section(root)
    }

    pub fn outline(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 0)];
        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            out.push_str(&format!("{}{} ({} paragraphs)\n", "  ".repeat(depth), node.title, node.contents.len()));
            for &c in node.children.iter().rev() { stack.push((c, depth + 1)); }
        }
        out
    }

    fn section_at(&self, id: NodeId) -> Section {
        let node = &self.nodes[id];
        Section {
            title: node.title.clone(),
            contents: node.contents.clone(),
            metadata: node.metadata.clone(),
            children: node.children.iter().map(|&c| self.section_at(c)).collect(),
        }
    }
}

fn push_section(nodes: &mut Vec<SectionNode>, section: Section) -> NodeId {
    let id = nodes.len();
    nodes.push(SectionNode { title: section.title, contents: section.contents, metadata: section.metadata, children: Vec::new() });
    let children: Vec<NodeId> = section.children.into_iter().map(|c| push_section(nodes, c)).collect();
    nodes[id].children = children;
    id
}

fn merge_small_leaves(section: &mut Section, min_chars: usize) {
    for child in &mut section.children { merge_small_leaves(child, min_chars); }
    let mut kept: Vec<Section> = Vec::with_capacity(section.children.len());
    for child in std::mem::take(&mut section.children) {
        let absorb = child.children.is_empty()
            && child.char_len() < min_chars
            && kept.last().is_some_and(|prev| prev.children.is_empty());
        match kept.last_mut() {
            Some(prev) if absorb => {
                let mut paragraphs = child.contents.into_iter();
                let lead = match paragraphs.next() {
                    Some(first) => format!("{} {}", child.title, first),
                    None => child.title,
                };
                prev.contents.push(lead);
                prev.contents.extend(paragraphs);
            }
            _ => kept.push(child),
        }
    }
    section.children = kept;
}

fn merge_short_paragraphs(section: &mut Section, min_chars: usize) {
    let mut merged: Vec<String> = Vec::with_capacity(section.contents.len());
    for paragraph in std::mem::take(&mut section.contents) {
        match merged.last_mut() {
            Some(prev) if prev.chars().count() < min_chars || paragraph.chars().count() < min_chars => {
                prev.push('\n');
                prev.push_str(&paragraph);
            }
            _ => merged.push(paragraph),
        }
    }
    section.contents = merged;
    for child in &mut section.children { merge_short_paragraphs(child, min_chars); }
}

pub struct Flatten<'a> {
    tree: &'a DocTree,
    stack: Vec<(NodeId, TreeIndex)>,
    current: Option<(NodeId, TreeIndex, usize)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = FlatParagraph<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree: &'a DocTree = self.tree;
        loop {
            if let Some((id, index, position)) = self.current.take() {
                let node = &tree.nodes[id];
                if position < node.contents.len() {
                    let item = FlatParagraph { tree_index: index.clone(), paragraph_index: position, text: &node.contents[position] };
                    self.current = Some((id, index, position + 1));
                    return Some(item);
                }
                for (i, &c) in node.children.iter().enumerate().rev() { self.stack.push((c, index.child(i))); }
            }
            let (id, index) = self.stack.pop()?;
            self.current = Some((id, index, 0));
        }
    }
}
