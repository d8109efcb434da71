//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod book;
pub mod builder;
pub mod copier;
pub mod entities;
pub mod error;
pub mod numbering;
pub mod records;
pub mod subtotal;

pub use arena::{InvoiceTree, LineNode};
pub use book::Book;
pub use builder::TreeBuilder;
pub use copier::{copy_invoice, copy_lines, copy_tree, snapshot, CopyDefaults, LineSnapshot};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use numbering::{chapter_numbers, number_tree, ChapterScope, ChaptersUnder, InvoiceRoots};
pub use records::{BookRecord, InvoiceRecord, LineRecord};
pub use subtotal::{is_chapter_subtotal, line_amount, line_amounts, subtotal_at};
