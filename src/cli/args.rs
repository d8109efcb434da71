//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use rust_decimal::Decimal;

/// Chapter-structured invoice lines: hierarchical numbering, chapter subtotals and deep tree copies
#[derive(Parser, Debug)]
#[command(name = "rschapter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Turn debugging information on (repeat for more: -d -d -d)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding the local .rschapter.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show chapter numbers of invoice lines
    Number {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Restrict to one invoice
        #[arg(short, long)]
        invoice: Option<String>,
        /// Restrict to these lines (requires --invoice)
        #[arg(short, long, requires = "invoice")]
        line: Vec<u64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the chapter subtotal of a subtotal line
    Subtotal {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Invoice holding the line
        #[arg(short, long)]
        invoice: String,
        /// Subtotal line id
        #[arg(short, long)]
        line: u64,
    },

    /// List every line with number, type, description and amount
    Report {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Restrict to one invoice
        #[arg(short, long)]
        invoice: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the line hierarchy as tree
    Tree {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Restrict to one invoice
        #[arg(short, long)]
        invoice: Option<String>,
    },

    /// Duplicate an invoice with all its lines
    Copy {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Source invoice
        #[arg(short, long)]
        invoice: String,
        /// Id of the new invoice
        #[arg(short, long)]
        to: String,
        /// Output file (default: overwrite FILE)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Duplicate line subtrees inside an invoice
    #[command(name = "copy-lines")]
    CopyLines {
        /// Invoice file (TOML)
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Invoice holding the lines
        #[arg(short, long)]
        invoice: String,
        /// Root lines of the subtrees to copy
        #[arg(short, long, required = true)]
        line: Vec<u64>,
        /// Title line receiving the copies (default: parent of each source)
        #[arg(short, long)]
        parent: Option<u64>,
        /// Replace the description of every copied line
        #[arg(long)]
        description: Option<String>,
        /// Replace the quantity of every copied line
        #[arg(long)]
        quantity: Option<Decimal>,
        /// Replace the unit price of every copied line
        #[arg(long)]
        unit_price: Option<Decimal>,
        /// Output file (default: overwrite FILE)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Show config paths
    Path,

    /// Print a config template
    Template,
}
