//! Tree builder turning flat invoice records into line hierarchies.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::arena::InvoiceTree;
use crate::domain::book::Book;
use crate::domain::entities::{Currency, InvoiceId, Line, LineId};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::records::{BookRecord, InvoiceRecord};

/// Constructs invoice trees from line records.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    /// parent id -> child ids in record order
    relationship_cache: HashMap<LineId, Vec<LineId>>,
    lines: HashMap<LineId, Line>,
    root_lines: Vec<LineId>,
    visited: HashSet<LineId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one invoice tree.
    ///
    /// Fails on duplicate ids, unknown parents, non-title parents and cycles.
    #[instrument(level = "debug", skip_all, fields(invoice = %record.id))]
    pub fn build(&mut self, record: &InvoiceRecord, currency: Currency) -> DomainResult<InvoiceTree> {
        // Reset state for a fresh invoice
        self.relationship_cache.clear();
        self.lines.clear();
        self.root_lines.clear();
        self.visited.clear();

        self.scan_records(record)?;
        self.check_parents(&record.id)?;

        let mut tree = InvoiceTree::new(record.id.clone(), currency);
        self.build_tree(&mut tree)?;

        // Lines never reached from a root hang in a cycle
        if self.visited.len() < self.lines.len() {
            let stuck = self
                .lines
                .keys()
                .filter(|id| !self.visited.contains(*id))
                .min()
                .copied()
                .unwrap_or(LineId(0));
            return Err(DomainError::CycleDetected {
                invoice: record.id.clone(),
                line: stuck,
            });
        }

        debug!("built invoice tree with {} lines", tree.len());
        Ok(tree)
    }

    /// Build all invoices of a book, resolving each invoice's currency code.
    pub fn build_book<F>(&mut self, book: &BookRecord, mut currency_for: F) -> DomainResult<Book>
    where
        F: FnMut(Option<&str>) -> DomainResult<Currency>,
    {
        let mut result = Book::new();
        for record in &book.invoices {
            let currency = currency_for(record.currency.as_deref())?;
            let tree = self.build(record, currency)?;
            if result.insert(tree).is_some() {
                return Err(DomainError::DuplicateInvoice(record.id.clone()));
            }
        }
        Ok(result)
    }

    fn scan_records(&mut self, record: &InvoiceRecord) -> DomainResult<()> {
        for line_record in &record.lines {
            if self.lines.contains_key(&line_record.id) {
                return Err(DomainError::DuplicateLine {
                    invoice: record.id.clone(),
                    line: line_record.id,
                });
            }
            self.lines.insert(line_record.id, line_record.to_line());
            match line_record.parent {
                Some(parent) => self
                    .relationship_cache
                    .entry(parent)
                    .or_default()
                    .push(line_record.id),
                None => self.root_lines.push(line_record.id),
            }
        }
        Ok(())
    }

    fn check_parents(&self, invoice: &InvoiceId) -> DomainResult<()> {
        for (parent, children) in &self.relationship_cache {
            if !self.lines.contains_key(parent) {
                return Err(DomainError::UnknownParent {
                    invoice: invoice.clone(),
                    line: children.first().copied().unwrap_or(*parent),
                    parent: *parent,
                });
            }
        }
        Ok(())
    }

    fn build_tree(&mut self, tree: &mut InvoiceTree) -> DomainResult<()> {
        // Reverse pushes keep left-to-right sibling order when popping
        let mut stack: Vec<(LineId, Option<_>)> =
            self.root_lines.iter().rev().map(|&id| (id, None)).collect();

        while let Some((current, parent_idx)) = stack.pop() {
            if !self.visited.insert(current) {
                return Err(DomainError::CycleDetected {
                    invoice: tree.invoice().clone(),
                    line: current,
                });
            }
            let line = self
                .lines
                .get(&current)
                .cloned()
                .ok_or_else(|| DomainError::Internal(format!("line {current} vanished")))?;
            let current_idx = tree.insert_line(line, parent_idx)?;

            if let Some(children) = self.relationship_cache.get(&current) {
                for &child in children.iter().rev() {
                    stack.push((child, Some(current_idx)));
                }
            }
        }
        Ok(())
    }
}
