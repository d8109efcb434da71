//! Line amounts and chapter-scoped running subtotals.
//!
//! A subtotal line inside a chapter shows the sum of the `line` amounts (and
//! nested chapter totals) since the previous subtotal line or the start of the
//! chapter. Each line amount is rounded with the invoice currency before it is
//! summed.

use std::collections::{BTreeMap, HashSet};

use generational_arena::Index;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::domain::arena::{InvoiceTree, LineNode};
use crate::domain::entities::{LineId, LineType};
use crate::domain::error::{DomainError, DomainResult};

/// Outcome of walking one chapter's children.
enum Walk {
    /// The target marker was reached with this running total.
    Found(Decimal),
    /// The children ran out; running total since the last marker.
    Exhausted(Decimal),
}

impl Walk {
    fn total(self) -> Decimal {
        match self {
            Walk::Found(total) | Walk::Exhausted(total) => total,
        }
    }
}

fn accumulate(running: Decimal, amount: Decimal, line: LineId) -> DomainResult<Decimal> {
    running
        .checked_add(amount)
        .ok_or(DomainError::AmountOverflow { line })
}

fn node(tree: &InvoiceTree, idx: Index) -> DomainResult<&LineNode> {
    tree.get_node(idx)
        .ok_or_else(|| DomainError::Internal("dangling line index".to_string()))
}

/// True for a subtotal line whose parent is a title line.
pub fn is_chapter_subtotal(tree: &InvoiceTree, idx: Index) -> bool {
    tree.get_node(idx)
        .filter(|n| n.line.line_type == LineType::Subtotal)
        .and_then(|n| n.parent)
        .and_then(|p| tree.line(p))
        .is_some_and(|parent| parent.is_title())
}

/// Running subtotal of a chapter up to the subtotal line `target`.
///
/// Fails with `NotChapterSubtotal` unless `target` is a subtotal under a title,
/// and with `StructuralInconsistency` if the walk never meets `target`.
#[instrument(level = "debug", skip(tree), fields(invoice = %tree.invoice()))]
pub fn subtotal_at(tree: &InvoiceTree, target: Index) -> DomainResult<Decimal> {
    let target_node = node(tree, target)?;
    let target_id = target_node.line.id;
    let parent = match target_node.parent {
        Some(parent) if is_chapter_subtotal(tree, target) => parent,
        _ => return Err(DomainError::NotChapterSubtotal(target_id)),
    };

    let mut visited = HashSet::new();
    match walk(tree, parent, target, target_node.line.line_type, &mut visited)? {
        Walk::Found(total) => {
            debug!("subtotal of line {} = {}", target_id, total);
            Ok(total)
        }
        Walk::Exhausted(_) => Err(DomainError::StructuralInconsistency { line: target_id }),
    }
}

fn walk(
    tree: &InvoiceTree,
    chapter: Index,
    target: Index,
    marker: LineType,
    visited: &mut HashSet<Index>,
) -> DomainResult<Walk> {
    if !visited.insert(chapter) {
        return Err(DomainError::CycleDetected {
            invoice: tree.invoice().clone(),
            line: node(tree, chapter)?.line.id,
        });
    }

    let mut running = Decimal::ZERO;
    for &child_idx in tree.children(chapter) {
        let child = node(tree, child_idx)?;
        // Nested chapters contribute their own running total; their resets stay local.
        if !child.children.is_empty() {
            let nested = walk(tree, child_idx, target, marker, visited)?.total();
            running = accumulate(running, nested, child.line.id)?;
        }
        if child.line.line_type == LineType::Line {
            running = accumulate(running, child.line.amount(tree.currency())?, child.line.id)?;
        } else if child.line.line_type == marker {
            if child_idx == target {
                return Ok(Walk::Found(running));
            }
            running = Decimal::ZERO;
        }
    }
    Ok(Walk::Exhausted(running))
}

/// Amount shown for any line.
///
/// - `line`: rounded `quantity * unit_price`
/// - chapter subtotal: [`subtotal_at`]
/// - root-level subtotal: running sum over the whole invoice in document order
/// - `title`, `comment`: zero
#[instrument(level = "trace", skip(tree))]
pub fn line_amount(tree: &InvoiceTree, idx: Index) -> DomainResult<Decimal> {
    let current = node(tree, idx)?;
    match current.line.line_type {
        LineType::Line => current.line.amount(tree.currency()),
        LineType::Subtotal if is_chapter_subtotal(tree, idx) => subtotal_at(tree, idx),
        LineType::Subtotal => invoice_subtotal(tree, idx),
        LineType::Title | LineType::Comment => Ok(Decimal::ZERO),
    }
}

/// Flat running subtotal over all invoice lines, used outside chapters.
fn invoice_subtotal(tree: &InvoiceTree, target: Index) -> DomainResult<Decimal> {
    let mut running = Decimal::ZERO;
    for (idx, current) in tree.iter() {
        match current.line.line_type {
            LineType::Line => {
                running = accumulate(running, current.line.amount(tree.currency())?, current.line.id)?;
            }
            LineType::Subtotal => {
                if idx == target {
                    return Ok(running);
                }
                running = Decimal::ZERO;
            }
            LineType::Title | LineType::Comment => {}
        }
    }
    Err(DomainError::StructuralInconsistency {
        line: node(tree, target)?.line.id,
    })
}

/// Amounts of every line of the invoice.
#[instrument(level = "debug", skip(tree), fields(invoice = %tree.invoice()))]
pub fn line_amounts(tree: &InvoiceTree) -> DomainResult<BTreeMap<LineId, Decimal>> {
    tree.iter()
        .map(|(idx, current)| Ok((current.line.id, line_amount(tree, idx)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Currency, InvoiceId, Line};
    use rust_decimal_macros::dec;

    fn invoice() -> InvoiceTree {
        InvoiceTree::new(InvoiceId::new("INV-S"), Currency::default())
    }

    fn item(id: u64, quantity: Decimal, price: Decimal) -> Line {
        Line::new(LineId(id), LineType::Line, format!("L{id}")).with_amounts(quantity, price)
    }

    #[test]
    fn given_fractional_amounts_when_summing_then_rounds_each_line_first() {
        let mut tree = invoice();
        let chapter = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "C"), None)
            .unwrap();
        tree.insert_line(item(2, dec!(1), dec!(0.005)), Some(chapter))
            .unwrap();
        tree.insert_line(item(3, dec!(1), dec!(0.005)), Some(chapter))
            .unwrap();
        let s = tree
            .insert_line(Line::new(LineId(4), LineType::Subtotal, "S"), Some(chapter))
            .unwrap();

        // 0.005 rounds half-even to 0.00 per line; summing first would give 0.01
        assert_eq!(subtotal_at(&tree, s).unwrap(), dec!(0.00));
    }

    #[test]
    fn given_subtotal_missing_from_chapter_children_when_aggregating_then_reports_inconsistency() {
        let mut tree = invoice();
        let chapter = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "C"), None)
            .unwrap();
        tree.insert_line(item(2, dec!(2), dec!(4)), Some(chapter))
            .unwrap();
        let s = tree
            .insert_line(Line::new(LineId(3), LineType::Subtotal, "S"), Some(chapter))
            .unwrap();
        tree.unlink_unchecked(chapter, s);

        assert_eq!(
            subtotal_at(&tree, s).unwrap_err(),
            DomainError::StructuralInconsistency { line: LineId(3) }
        );
    }

    #[test]
    fn given_root_subtotal_when_aggregating_as_chapter_then_rejects() {
        let mut tree = invoice();
        tree.insert_line(item(1, dec!(1), dec!(3)), None).unwrap();
        let s = tree
            .insert_line(Line::new(LineId(2), LineType::Subtotal, "S"), None)
            .unwrap();

        assert_eq!(
            subtotal_at(&tree, s).unwrap_err(),
            DomainError::NotChapterSubtotal(LineId(2))
        );
        assert_eq!(line_amount(&tree, s).unwrap(), dec!(3.00));
    }

    #[test]
    fn given_cycle_between_chapters_when_aggregating_then_fails_fast() {
        let mut tree = invoice();
        let a = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "A"), None)
            .unwrap();
        let b = tree
            .insert_line(Line::new(LineId(2), LineType::Title, "B"), Some(a))
            .unwrap();
        tree.insert_line(item(3, dec!(1), dec!(1)), Some(b)).unwrap();
        let s = tree
            .insert_line(Line::new(LineId(4), LineType::Subtotal, "S"), Some(a))
            .unwrap();
        tree.link_unchecked(b, a);

        assert!(matches!(
            subtotal_at(&tree, s).unwrap_err(),
            DomainError::CycleDetected { .. }
        ));
    }
}
