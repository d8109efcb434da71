use std::collections::HashMap;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{Currency, InvoiceId, Line, LineId, LineType};
use crate::domain::error::{DomainError, DomainResult};

/// Tree node in the arena-based line hierarchy.
#[derive(Debug, Clone)]
pub struct LineNode {
    /// Line payload for this node
    pub line: Line,
    /// Index of parent node in the arena, None for root lines
    pub parent: Option<Index>,
    /// Indices of child nodes in sibling order
    pub children: Vec<Index>,
}

/// Arena-based forest of the lines of one invoice.
///
/// Parent links never leave the arena, so a parent always belongs to the same
/// invoice. Root order and child order are insertion order.
#[derive(Debug, Clone)]
pub struct InvoiceTree {
    invoice: InvoiceId,
    currency: Currency,
    arena: Arena<LineNode>,
    /// Root lines (`parent = None`) in sibling order
    roots: Vec<Index>,
    by_id: HashMap<LineId, Index>,
    next_id: u64,
}

impl InvoiceTree {
    pub fn new(invoice: InvoiceId, currency: Currency) -> Self {
        Self {
            invoice,
            currency,
            arena: Arena::new(),
            roots: Vec::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn invoice(&self) -> &InvoiceId {
        &self.invoice
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Appends `line` as last child of `parent` (or as last root).
    #[instrument(level = "trace", skip(self, line), fields(line = %line.id))]
    pub fn insert_line(&mut self, line: Line, parent: Option<Index>) -> DomainResult<Index> {
        self.insert_line_at(line, parent, None)
    }

    /// Inserts `line` under `parent` (or among the roots) at `position`.
    ///
    /// `None` or an out-of-range position appends. The parent must be a title line.
    #[instrument(level = "trace", skip(self, line), fields(line = %line.id))]
    pub fn insert_line_at(
        &mut self,
        line: Line,
        parent: Option<Index>,
        position: Option<usize>,
    ) -> DomainResult<Index> {
        if self.by_id.contains_key(&line.id) {
            return Err(DomainError::DuplicateLine {
                invoice: self.invoice.clone(),
                line: line.id,
            });
        }
        if let Some(parent_idx) = parent {
            let parent_node = self.arena.get(parent_idx).ok_or_else(|| {
                DomainError::Internal(format!("stale parent index for line {}", line.id))
            })?;
            if parent_node.line.line_type != LineType::Title {
                return Err(DomainError::ParentNotTitle {
                    line: line.id,
                    parent: parent_node.line.id,
                });
            }
        }

        let id = line.id;
        let node_idx = self.arena.insert(LineNode {
            line,
            parent,
            children: Vec::new(),
        });
        self.by_id.insert(id, node_idx);
        self.next_id = self.next_id.max(id.0 + 1);

        let siblings = match parent.and_then(|p| self.arena.get_mut(p)) {
            Some(parent_node) => &mut parent_node.children,
            None => &mut self.roots,
        };
        match position {
            Some(pos) if pos < siblings.len() => siblings.insert(pos, node_idx),
            _ => siblings.push(node_idx),
        }

        Ok(node_idx)
    }

    /// Hands out a line id not used in this invoice.
    pub fn allocate_id(&mut self) -> LineId {
        let id = LineId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn find(&self, id: LineId) -> Option<Index> {
        self.by_id.get(&id).copied()
    }

    /// Like [`find`](Self::find) but fails with `LineNotFound`.
    pub fn require(&self, id: LineId) -> DomainResult<Index> {
        self.find(id).ok_or_else(|| DomainError::LineNotFound {
            invoice: self.invoice.clone(),
            line: id,
        })
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_node(&self, idx: Index) -> Option<&LineNode> {
        self.arena.get(idx)
    }

    pub fn line(&self, idx: Index) -> Option<&Line> {
        self.arena.get(idx).map(|n| &n.line)
    }

    /// Mutable access to the line payload; the tree shape stays untouched.
    pub fn line_mut(&mut self, idx: Index) -> Option<&mut Line> {
        self.arena.get_mut(idx).map(|n| &mut n.line)
    }

    /// Ordered root lines, the invoice's `lines_tree`.
    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn children(&self, idx: Index) -> &[Index] {
        self.arena
            .get(idx)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, idx: Index) -> Option<Index> {
        self.arena.get(idx).and_then(|n| n.parent)
    }

    /// Number of ancestors of `idx`; roots are level 0.
    pub fn level(&self, idx: Index) -> usize {
        let mut level = 0;
        let mut current = self.parent(idx);
        while let Some(parent) = current {
            if level >= self.arena.len() {
                break;
            }
            level += 1;
            current = self.parent(parent);
        }
        level
    }

    /// Removes a line together with all its descendants.
    ///
    /// Returns the removed lines in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_line(&mut self, idx: Index) -> DomainResult<Vec<Line>> {
        let node = self
            .arena
            .get(idx)
            .ok_or_else(|| DomainError::Internal("stale index in remove_line".to_string()))?;
        let parent = node.parent;
        match parent {
            Some(p) => {
                if let Some(parent) = self.arena.get_mut(p) {
                    parent.children.retain(|&c| c != idx);
                }
            }
            None => self.roots.retain(|&r| r != idx),
        }

        let mut removed = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.arena.remove(current) {
                self.by_id.remove(&node.line.id);
                stack.extend(node.children.iter().rev());
                removed.push(node.line);
            }
        }
        Ok(removed)
    }

    /// Pre-order iterator over all lines, roots left to right.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Links `child` under `parent` without any checks, to build broken shapes in tests.
    #[cfg(test)]
    pub(crate) fn link_unchecked(&mut self, parent: Index, child: Index) {
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Drops `child` from `parent`'s children but keeps the child's parent link.
    #[cfg(test)]
    pub(crate) fn unlink_unchecked(&mut self, parent: Index, child: Index) {
        if let Some(node) = self.arena.get_mut(parent) {
            node.children.retain(|&c| c != child);
        }
    }
}

pub struct TreeIterator<'a> {
    tree: &'a InvoiceTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a InvoiceTree) -> Self {
        // Push roots in reverse order for left-to-right traversal
        let stack = tree.roots.iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a LineNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current_idx, node));
            }
        }
        None
    }
}
