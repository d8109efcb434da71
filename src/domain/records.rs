//! Flat, serializable records of invoices and their lines.
//!
//! This is the shape invoices take on disk: every line lists its parent id,
//! sibling order is record order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::arena::InvoiceTree;
use crate::domain::book::Book;
use crate::domain::entities::{InvoiceId, Line, LineId, LineType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    /// Currency code; the configured default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    pub id: LineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<LineId>,
    #[serde(rename = "type", default)]
    pub line_type: LineType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wbs: Option<String>,
}

impl LineRecord {
    pub fn to_line(&self) -> Line {
        Line {
            id: self.id,
            line_type: self.line_type,
            description: self.description.clone(),
            quantity: self.quantity.unwrap_or_default(),
            unit_price: self.unit_price.unwrap_or_default(),
            wbs: self.wbs.clone(),
        }
    }

    fn from_line(line: &Line, parent: Option<LineId>) -> Self {
        let priced = line.line_type == LineType::Line;
        Self {
            id: line.id,
            parent,
            line_type: line.line_type,
            description: line.description.clone(),
            quantity: priced.then_some(line.quantity),
            unit_price: priced.then_some(line.unit_price),
            wbs: line.wbs.clone(),
        }
    }
}

impl InvoiceRecord {
    /// Flattens a tree into records in document order, parents before children.
    pub fn from_tree(tree: &InvoiceTree) -> Self {
        let lines = tree
            .iter()
            .map(|(_, node)| {
                let parent = node.parent.and_then(|p| tree.line(p)).map(|l| l.id);
                LineRecord::from_line(&node.line, parent)
            })
            .collect();
        Self {
            id: tree.invoice().clone(),
            currency: Some(tree.currency().code.clone()),
            lines,
        }
    }
}

impl BookRecord {
    pub fn from_book(book: &Book) -> Self {
        Self {
            invoices: book.iter().map(InvoiceRecord::from_tree).collect(),
        }
    }
}
