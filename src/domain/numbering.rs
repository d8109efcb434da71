//! Hierarchical chapter numbering ("1", "1.1", "1.2", "2", ...).
//!
//! Labels are purely positional and recomputed from scratch on every call,
//! so they never go stale after structural changes.

use std::collections::{BTreeMap, HashSet};

use generational_arena::Index;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::domain::arena::InvoiceTree;
use crate::domain::book::Book;
use crate::domain::entities::{LineId, LineKey};
use crate::domain::error::{DomainError, DomainResult};

/// Supplies the top of the numbering domain for one kind of chapter owner.
pub trait ChapterScope {
    /// First-level chapters of `tree`, in sibling order.
    fn first_level_chapters(&self, tree: &InvoiceTree) -> Vec<Index>;
}

/// Numbers all root lines of an invoice.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceRoots;

impl ChapterScope for InvoiceRoots {
    fn first_level_chapters(&self, tree: &InvoiceTree) -> Vec<Index> {
        tree.roots().to_vec()
    }
}

/// Numbers the chapters directly under a higher-level title line.
///
/// Invoices without that line contribute no labels.
#[derive(Debug, Clone, Copy)]
pub struct ChaptersUnder(pub LineId);

impl ChapterScope for ChaptersUnder {
    fn first_level_chapters(&self, tree: &InvoiceTree) -> Vec<Index> {
        tree.find(self.0)
            .map(|idx| tree.children(idx).to_vec())
            .unwrap_or_default()
    }
}

/// Labels every line reachable from the scope's first-level chapters.
#[instrument(level = "debug", skip_all, fields(invoice = %tree.invoice()))]
pub fn number_tree<S>(scope: &S, tree: &InvoiceTree) -> DomainResult<BTreeMap<LineId, String>>
where
    S: ChapterScope + ?Sized,
{
    let first_level = scope.first_level_chapters(tree);
    let mut labels = BTreeMap::new();
    let mut visited = HashSet::new();
    assign(tree, &first_level, "", &mut visited, &mut labels)?;
    debug!("numbered {} of {} lines", labels.len(), tree.len());
    Ok(labels)
}

fn assign(
    tree: &InvoiceTree,
    siblings: &[Index],
    prefix: &str,
    visited: &mut HashSet<Index>,
    labels: &mut BTreeMap<LineId, String>,
) -> DomainResult<()> {
    for (position, &idx) in siblings.iter().enumerate() {
        let node = tree
            .get_node(idx)
            .ok_or_else(|| DomainError::Internal("dangling child index".to_string()))?;
        if !visited.insert(idx) {
            return Err(DomainError::CycleDetected {
                invoice: tree.invoice().clone(),
                line: node.line.id,
            });
        }

        let label = format!("{}{}", prefix, position + 1);
        if !node.children.is_empty() {
            assign(tree, &node.children, &format!("{label}."), visited, labels)?;
        }
        labels.insert(node.line.id, label);
    }
    Ok(())
}

/// Computes chapter labels for a batch of requested lines.
///
/// Every invoice touched by the batch is numbered exactly once; invoices are
/// independent and numbered in parallel. Requested lines outside the scope map
/// to `None`.
#[instrument(level = "debug", skip_all, fields(requested = requested.len()))]
pub fn chapter_numbers<S>(
    scope: &S,
    book: &Book,
    requested: &[LineKey],
) -> DomainResult<BTreeMap<LineKey, Option<String>>>
where
    S: ChapterScope + Sync + ?Sized,
{
    let mut result: BTreeMap<LineKey, Option<String>> =
        requested.iter().map(|key| (key.clone(), None)).collect();

    let trees = requested
        .iter()
        .map(|key| &key.invoice)
        .unique()
        .map(|invoice| book.require(invoice))
        .collect::<DomainResult<Vec<_>>>()?;
    debug!("numbering {} invoices", trees.len());

    let per_invoice = trees
        .par_iter()
        .map(|tree| number_tree(scope, tree).map(|labels| (tree.invoice(), labels)))
        .collect::<DomainResult<Vec<_>>>()?;

    for (invoice, labels) in per_invoice {
        for (line, label) in labels {
            if let Some(slot) = result.get_mut(&LineKey::new(invoice.clone(), line)) {
                *slot = Some(label);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Currency, InvoiceId, Line, LineType};

    fn tree_with_cycle() -> InvoiceTree {
        let mut tree = InvoiceTree::new(InvoiceId::new("INV-C"), Currency::default());
        let a = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "A"), None)
            .unwrap();
        let b = tree
            .insert_line(Line::new(LineId(2), LineType::Title, "B"), Some(a))
            .unwrap();
        tree.link_unchecked(b, a);
        tree
    }

    #[test]
    fn given_cyclic_links_when_numbering_then_fails_fast() {
        let tree = tree_with_cycle();
        let err = number_tree(&InvoiceRoots, &tree).unwrap_err();
        assert_eq!(
            err,
            DomainError::CycleDetected {
                invoice: InvoiceId::new("INV-C"),
                line: LineId(1)
            }
        );
    }

    #[test]
    fn given_empty_invoice_when_numbering_then_returns_no_labels() {
        let tree = InvoiceTree::new(InvoiceId::new("INV-E"), Currency::default());
        assert!(number_tree(&InvoiceRoots, &tree).unwrap().is_empty());
    }

    #[test]
    fn given_missing_anchor_when_numbering_under_it_then_returns_no_labels() {
        let tree = tree_with_cycle();
        assert!(number_tree(&ChaptersUnder(LineId(99)), &tree)
            .unwrap()
            .is_empty());
    }
}
