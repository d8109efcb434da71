//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{InvoiceId, LineId};

/// Domain errors represent business logic violations.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    #[error("duplicate invoice: {0}")]
    DuplicateInvoice(InvoiceId),

    #[error("line {line} not found in invoice {invoice}")]
    LineNotFound { invoice: InvoiceId, line: LineId },

    #[error("duplicate line {line} in invoice {invoice}")]
    DuplicateLine { invoice: InvoiceId, line: LineId },

    #[error("line {line} references unknown parent {parent} in invoice {invoice}")]
    UnknownParent {
        invoice: InvoiceId,
        line: LineId,
        parent: LineId,
    },

    #[error("line {line}: parent {parent} is not a title line")]
    ParentNotTitle { line: LineId, parent: LineId },

    #[error("cycle detected in line hierarchy at line {line} (invoice {invoice})")]
    CycleDetected { invoice: InvoiceId, line: LineId },

    #[error("line {0} is not a subtotal inside a chapter")]
    NotChapterSubtotal(LineId),

    #[error("structural inconsistency: subtotal {line} not found among its chapter's children")]
    StructuralInconsistency { line: LineId },

    #[error("amount of line {line} overflows the decimal range")]
    AmountOverflow { line: LineId },

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("internal tree operation failed: {0}")]
    Internal(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
