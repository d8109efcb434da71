//! Invoice book service
//!
//! Loads invoice books from TOML files, runs the chapter operations on them
//! and writes them back.

use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    chapter_numbers, copier, line_amounts, number_tree, subtotal_at, Book, BookRecord,
    CopyDefaults, DomainError, DomainResult, InvoiceId, InvoiceRoots, InvoiceTree, LineId,
    LineKey, LineType, TreeBuilder,
};
use crate::infrastructure::traits::FileSystem;

/// Chapter label of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberRow {
    pub invoice: InvoiceId,
    pub line: LineId,
    pub number: Option<String>,
}

/// One line of an invoice report, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub invoice: InvoiceId,
    pub line: LineId,
    pub number: Option<String>,
    #[serde(rename = "type")]
    pub line_type: LineType,
    pub description: String,
    /// Nesting level, roots are 0
    pub level: usize,
    pub amount: Decimal,
    pub currency: String,
}

/// Service for invoice files and chapter operations.
pub struct InvoiceService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl InvoiceService {
    /// Create a new invoice service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Load and validate all invoices of a TOML file.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<Book> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::InvalidInvoiceFile {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read invoice file", path)?;
        let record: BookRecord =
            toml::from_str(&content).map_err(|e| ApplicationError::InvalidInvoiceFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let book = TreeBuilder::new().build_book(&record, |code| self.settings.currency(code))?;
        debug!("loaded {} invoices from {}", book.len(), path.display());
        Ok(book)
    }

    /// Write all invoices of `book` to a TOML file, parents before children.
    #[instrument(level = "debug", skip(self, book))]
    pub fn save(&self, book: &Book, path: &Path) -> ApplicationResult<()> {
        let record = BookRecord::from_book(book);
        let content =
            toml::to_string_pretty(&record).map_err(|e| ApplicationError::OperationFailed {
                context: format!("serialize invoices for {}", path.display()),
                source: Box::new(e),
            })?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, &content)
            .with_path_context("write invoice file", path)?;
        debug!("saved {} invoices to {}", book.len(), path.display());
        Ok(())
    }

    /// Chapter labels of the requested lines, in request order.
    ///
    /// Without `invoice` every line of the book is labelled; `lines` narrows
    /// the selection within `invoice` and is ignored otherwise.
    #[instrument(level = "debug", skip(self, book))]
    pub fn numbers(
        &self,
        book: &Book,
        invoice: Option<&InvoiceId>,
        lines: &[LineId],
    ) -> ApplicationResult<Vec<NumberRow>> {
        let keys = requested_keys(book, invoice, lines)?;
        let numbers = chapter_numbers(&InvoiceRoots, book, &keys)?;
        Ok(keys
            .into_iter()
            .map(|key| {
                let number = numbers.get(&key).cloned().flatten();
                NumberRow {
                    invoice: key.invoice,
                    line: key.line,
                    number,
                }
            })
            .collect())
    }

    /// Chapter subtotal of a subtotal line nested in a chapter.
    #[instrument(level = "debug", skip(self, book))]
    pub fn subtotal(
        &self,
        book: &Book,
        invoice: &InvoiceId,
        line: LineId,
    ) -> ApplicationResult<Decimal> {
        let tree = book.require(invoice)?;
        let idx = tree.require(line)?;
        Ok(subtotal_at(tree, idx)?)
    }

    /// Every line with label, type, description and amount.
    #[instrument(level = "debug", skip(self, book))]
    pub fn report(
        &self,
        book: &Book,
        invoice: Option<&InvoiceId>,
    ) -> ApplicationResult<Vec<ReportRow>> {
        let trees: Vec<&InvoiceTree> = match invoice {
            Some(id) => vec![book.require(id)?],
            None => book.iter().collect(),
        };

        let mut rows = Vec::new();
        for tree in trees {
            let labels = number_tree(&InvoiceRoots, tree)?;
            let amounts = line_amounts(tree)?;
            for (idx, node) in tree.iter() {
                let line = &node.line;
                rows.push(ReportRow {
                    invoice: tree.invoice().clone(),
                    line: line.id,
                    number: labels.get(&line.id).cloned(),
                    line_type: line.line_type,
                    description: line.description.clone(),
                    level: tree.level(idx),
                    amount: amounts.get(&line.id).copied().unwrap_or_default(),
                    currency: tree.currency().code.clone(),
                });
            }
        }
        Ok(rows)
    }

    /// Duplicate invoice `source` as `new_id`; returns the number of copied lines.
    #[instrument(level = "debug", skip(self, book))]
    pub fn copy_invoice(
        &self,
        book: &mut Book,
        source: &InvoiceId,
        new_id: InvoiceId,
    ) -> ApplicationResult<usize> {
        if book.get(&new_id).is_some() {
            return Err(DomainError::DuplicateInvoice(new_id).into());
        }
        let copy = copier::copy_invoice(book.require(source)?, new_id)?;
        let copied = copy.len();
        book.insert(copy);
        Ok(copied)
    }

    /// Duplicate the subtrees at `lines` inside `invoice`.
    ///
    /// `parent` is resolved within the invoice and replaces `defaults.parent`.
    /// Returns the ids of the new subtree roots.
    #[instrument(level = "debug", skip(self, book, defaults))]
    pub fn copy_lines(
        &self,
        book: &mut Book,
        invoice: &InvoiceId,
        lines: &[LineId],
        parent: Option<LineId>,
        defaults: CopyDefaults,
    ) -> ApplicationResult<Vec<LineId>> {
        let tree = book.require_mut(invoice)?;
        let roots = lines
            .iter()
            .map(|&line| tree.require(line))
            .collect::<DomainResult<Vec<_>>>()?;
        let defaults = CopyDefaults {
            parent: parent.map(|p| tree.require(p)).transpose()?,
            ..defaults
        };

        let new_roots = copier::copy_lines(tree, &roots, &defaults)?;
        Ok(new_roots
            .iter()
            .filter_map(|&idx| tree.line(idx).map(|line| line.id))
            .collect())
    }
}

fn requested_keys(
    book: &Book,
    invoice: Option<&InvoiceId>,
    lines: &[LineId],
) -> DomainResult<Vec<LineKey>> {
    let Some(id) = invoice else {
        return Ok(book.line_keys());
    };

    let tree = book.require(id)?;
    if lines.is_empty() {
        return Ok(tree
            .iter()
            .map(|(_, node)| LineKey::new(id.clone(), node.line.id))
            .collect());
    }
    lines
        .iter()
        .map(|&line| tree.require(line).map(|_| LineKey::new(id.clone(), line)))
        .collect()
}
