//! A collection of invoice trees, the batch scope for numbering.

use std::collections::BTreeMap;

use crate::domain::arena::InvoiceTree;
use crate::domain::entities::{InvoiceId, LineKey};
use crate::domain::error::{DomainError, DomainResult};

/// Invoice trees keyed by invoice id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Book {
    invoices: BTreeMap<InvoiceId, InvoiceTree>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tree, returning the one it replaces.
    pub fn insert(&mut self, tree: InvoiceTree) -> Option<InvoiceTree> {
        self.invoices.insert(tree.invoice().clone(), tree)
    }

    pub fn get(&self, id: &InvoiceId) -> Option<&InvoiceTree> {
        self.invoices.get(id)
    }

    /// Like [`get`](Self::get) but fails with `InvoiceNotFound`.
    pub fn require(&self, id: &InvoiceId) -> DomainResult<&InvoiceTree> {
        self.get(id)
            .ok_or_else(|| DomainError::InvoiceNotFound(id.clone()))
    }

    pub fn require_mut(&mut self, id: &InvoiceId) -> DomainResult<&mut InvoiceTree> {
        self.invoices
            .get_mut(id)
            .ok_or_else(|| DomainError::InvoiceNotFound(id.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &InvoiceTree> {
        self.invoices.values()
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    /// Keys of every line of every invoice, in invoice then document order.
    pub fn line_keys(&self) -> Vec<LineKey> {
        self.iter()
            .flat_map(|tree| {
                tree.iter()
                    .map(move |(_, node)| LineKey::new(tree.invoice().clone(), node.line.id))
            })
            .collect()
    }
}
