//! Chapter-structured invoice lines.
//!
//! Invoice lines form a forest per invoice: `title` lines open chapters,
//! every other line type sits at the leaves. On top of that structure the
//! crate computes hierarchical chapter numbers, chapter subtotals and deep
//! copies of line subtrees.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
