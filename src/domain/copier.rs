//! Deep copies of line subtrees.
//!
//! A copy gets fresh line ids from the target invoice, the same shape and
//! field values as its source, and never inherits the `wbs` reference.

use std::collections::HashSet;

use generational_arena::Index;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::domain::arena::InvoiceTree;
use crate::domain::entities::{InvoiceId, Line};
use crate::domain::error::{DomainError, DomainResult};

/// Field replacements applied to every copied root.
///
/// `parent` binds the copies under a title line of the target invoice; the
/// remaining fields override the copied values when set. Descendants are
/// always rebound to their freshly copied parent.
#[derive(Debug, Clone, Default)]
pub struct CopyDefaults {
    pub parent: Option<Index>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

impl CopyDefaults {
    pub fn under(parent: Index) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    fn apply(&self, line: &mut Line) {
        if let Some(description) = &self.description {
            line.description = description.clone();
        }
        if let Some(quantity) = self.quantity {
            line.quantity = quantity;
        }
        if let Some(unit_price) = self.unit_price {
            line.unit_price = unit_price;
        }
    }
}

/// Owned copy of a subtree, detached from any arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSnapshot {
    pub line: Line,
    pub children: Vec<LineSnapshot>,
}

impl LineSnapshot {
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

/// Snapshots the subtree rooted at `idx`.
pub fn snapshot(tree: &InvoiceTree, idx: Index) -> DomainResult<LineSnapshot> {
    let mut visited = HashSet::new();
    snapshot_rec(tree, idx, &mut visited)
}

fn snapshot_rec(
    tree: &InvoiceTree,
    idx: Index,
    visited: &mut HashSet<Index>,
) -> DomainResult<LineSnapshot> {
    let node = tree
        .get_node(idx)
        .ok_or_else(|| DomainError::Internal("dangling line index".to_string()))?;
    if !visited.insert(idx) {
        return Err(DomainError::CycleDetected {
            invoice: tree.invoice().clone(),
            line: node.line.id,
        });
    }
    let children = node
        .children
        .iter()
        .map(|&child| snapshot_rec(tree, child, visited))
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(LineSnapshot {
        line: node.line.clone(),
        children,
    })
}

/// Inserts `snapshot` into `target` with fresh ids, returning the new root.
fn graft(
    target: &mut InvoiceTree,
    snapshot: &LineSnapshot,
    defaults: &CopyDefaults,
) -> DomainResult<Index> {
    let mut line = snapshot.line.clone();
    line.id = target.allocate_id();
    line.wbs = None;
    defaults.apply(&mut line);

    let new_idx = target.insert_line(line, defaults.parent)?;
    let child_defaults = CopyDefaults {
        parent: Some(new_idx),
        ..defaults.clone()
    };
    for child in &snapshot.children {
        graft(target, child, &child_defaults)?;
    }
    Ok(new_idx)
}

/// Copies the subtrees at `roots` of `source` into `target`.
///
/// Returns the new roots in the order of `roots`.
#[instrument(level = "debug", skip_all, fields(source = %source.invoice(), target = %target.invoice(), roots = roots.len()))]
pub fn copy_tree(
    source: &InvoiceTree,
    roots: &[Index],
    target: &mut InvoiceTree,
    defaults: &CopyDefaults,
) -> DomainResult<Vec<Index>> {
    let snapshots = roots
        .iter()
        .map(|&root| snapshot(source, root))
        .collect::<DomainResult<Vec<_>>>()?;
    graft_all(target, &snapshots, defaults)
}

/// Copies subtrees of `tree` into the same invoice.
///
/// Without a `parent` default each copy lands next to its source, under the
/// source's parent.
#[instrument(level = "debug", skip_all, fields(invoice = %tree.invoice(), roots = roots.len()))]
pub fn copy_lines(
    tree: &mut InvoiceTree,
    roots: &[Index],
    defaults: &CopyDefaults,
) -> DomainResult<Vec<Index>> {
    let mut new_roots = Vec::with_capacity(roots.len());
    for &root in roots {
        let snap = snapshot(tree, root)?;
        let root_defaults = CopyDefaults {
            parent: defaults.parent.or_else(|| tree.parent(root)),
            ..defaults.clone()
        };
        new_roots.push(graft(tree, &snap, &root_defaults)?);
    }
    debug!("copied {} subtrees", new_roots.len());
    Ok(new_roots)
}

fn graft_all(
    target: &mut InvoiceTree,
    snapshots: &[LineSnapshot],
    defaults: &CopyDefaults,
) -> DomainResult<Vec<Index>> {
    let new_roots = snapshots
        .iter()
        .map(|snap| graft(target, snap, defaults))
        .collect::<DomainResult<Vec<_>>>()?;
    debug!(
        "copied {} lines",
        snapshots.iter().map(LineSnapshot::node_count).sum::<usize>()
    );
    Ok(new_roots)
}

/// Duplicates a whole invoice under `new_id`, keeping its currency.
///
/// All root lines are copied with their subtrees; every copy belongs to the
/// new invoice.
#[instrument(level = "debug", skip(tree), fields(source = %tree.invoice()))]
pub fn copy_invoice(tree: &InvoiceTree, new_id: InvoiceId) -> DomainResult<InvoiceTree> {
    let mut copy = InvoiceTree::new(new_id, tree.currency().clone());
    copy_tree(tree, tree.roots(), &mut copy, &CopyDefaults::default())?;
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Currency, LineId, LineType};
    use rust_decimal_macros::dec;

    fn sample() -> (InvoiceTree, Index) {
        let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::default());
        let a = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "A").with_wbs("W1"), None)
            .unwrap();
        tree.insert_line(
            Line::new(LineId(2), LineType::Line, "B")
                .with_amounts(dec!(2), dec!(5))
                .with_wbs("W2"),
            Some(a),
        )
        .unwrap();
        (tree, a)
    }

    #[test]
    fn given_defaults_when_copying_then_overrides_roots_and_descendants() {
        let (mut tree, a) = sample();
        let defaults = CopyDefaults {
            quantity: Some(dec!(7)),
            ..CopyDefaults::default()
        };

        let new_roots = copy_lines(&mut tree, &[a], &defaults).unwrap();

        let copy = snapshot(&tree, new_roots[0]).unwrap();
        assert_eq!(copy.line.quantity, dec!(7));
        assert_eq!(copy.children[0].line.quantity, dec!(7));
        assert_eq!(copy.children[0].line.unit_price, dec!(5));
    }

    #[test]
    fn given_same_invoice_when_copying_lines_then_appends_fresh_ids() {
        let (mut tree, a) = sample();

        let new_roots = copy_lines(&mut tree, &[a], &CopyDefaults::default()).unwrap();

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.len(), 4);
        let copy = snapshot(&tree, new_roots[0]).unwrap();
        assert_eq!(copy.line.id, LineId(3));
        assert_eq!(copy.children[0].line.id, LineId(4));
        assert!(copy.line.wbs.is_none());
        assert!(copy.children[0].line.wbs.is_none());
    }

    #[test]
    fn given_non_title_parent_default_when_copying_then_rejects() {
        let (mut tree, a) = sample();
        let leaf = tree.find(LineId(2)).unwrap();

        let err = copy_lines(&mut tree, &[a], &CopyDefaults::under(leaf)).unwrap_err();

        assert!(matches!(err, DomainError::ParentNotTitle { .. }));
    }

    #[test]
    fn given_nested_line_without_parent_default_when_copying_then_keeps_source_parent() {
        let (mut tree, a) = sample();
        let b = tree.find(LineId(2)).unwrap();

        let new_roots = copy_lines(&mut tree, &[b], &CopyDefaults::default()).unwrap();

        assert_eq!(tree.parent(new_roots[0]), Some(a));
        assert_eq!(tree.children(a).len(), 2);
        assert_eq!(tree.roots().len(), 1);
    }
}
