//! Domain entities: core data structures

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, DomainResult};

/// Identifier of an invoice (the document owning a line forest).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a line, unique within its invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u64);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique reference to a line: owning invoice plus line id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineKey {
    pub invoice: InvoiceId,
    pub line: LineId,
}

impl LineKey {
    pub fn new(invoice: InvoiceId, line: LineId) -> Self {
        Self { invoice, line }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.invoice, self.line)
    }
}

/// Kind of an invoice line.
///
/// `Title` lines are chapter headers and the only valid parents.
/// `Subtotal` lines close a running-sum segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Line,
    Title,
    Subtotal,
    Comment,
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineType::Line => "line",
            LineType::Title => "title",
            LineType::Subtotal => "subtotal",
            LineType::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// Currency with its rounding policy.
///
/// Amounts are rounded to a multiple of `rounding` (half-even), then to `digits`
/// decimal places. A zero `rounding` rounds to `digits` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub rounding: Decimal,
    pub digits: u32,
}

impl Currency {
    pub fn new(code: impl Into<String>, rounding: Decimal, digits: u32) -> Self {
        Self {
            code: code.into(),
            rounding: rounding.abs(),
            digits,
        }
    }

    /// Round `amount` according to this currency, `None` on overflow.
    pub fn round(&self, amount: Decimal) -> Option<Decimal> {
        let rounded = if self.rounding.is_zero() {
            amount
        } else {
            amount
                .checked_div(self.rounding)?
                .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
                .checked_mul(self.rounding)?
        };
        Some(rounded.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointNearestEven))
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::new("EUR", Decimal::new(1, 2), 2)
    }
}

/// An invoice line. Tree links live in the arena, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: LineId,
    pub line_type: LineType,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Auxiliary work-breakdown reference; copies never inherit it.
    pub wbs: Option<String>,
}

impl Line {
    pub fn new(id: LineId, line_type: LineType, description: impl Into<String>) -> Self {
        Self {
            id,
            line_type,
            description: description.into(),
            quantity: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            wbs: None,
        }
    }

    pub fn with_amounts(mut self, quantity: Decimal, unit_price: Decimal) -> Self {
        self.quantity = quantity;
        self.unit_price = unit_price;
        self
    }

    pub fn with_wbs(mut self, wbs: impl Into<String>) -> Self {
        self.wbs = Some(wbs.into());
        self
    }

    /// Unrounded `quantity * unit_price`.
    pub fn raw_amount(&self) -> DomainResult<Decimal> {
        self.quantity
            .checked_mul(self.unit_price)
            .ok_or(DomainError::AmountOverflow { line: self.id })
    }

    /// `quantity * unit_price` rounded with `currency`.
    pub fn amount(&self, currency: &Currency) -> DomainResult<Decimal> {
        currency
            .round(self.raw_amount()?)
            .ok_or(DomainError::AmountOverflow { line: self.id })
    }

    pub fn is_title(&self) -> bool {
        self.line_type == LineType::Title
    }
}
