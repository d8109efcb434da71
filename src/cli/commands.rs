//! Command dispatch: one handler per subcommand.

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::Shell;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{Book, CopyDefaults, InvoiceId, InvoiceTree, LineId, LineType};
use crate::infrastructure::{InfraError, ServiceContainer};
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage("no command given, see --help".to_string()));
    };
    if let Commands::Completion { shell } = command {
        return _completion(*shell);
    }

    let dir = resolve_dir(cli)?;
    let settings = Settings::load(Some(dir.as_path()))?;
    debug!("settings: {:?}", settings);

    if let Commands::Config { command } = command {
        return _config(command, &settings, &dir);
    }

    let container = ServiceContainer::new(settings);
    match command {
        Commands::Number {
            file,
            invoice,
            line,
            json,
        } => _number(&container, file, invoice.as_deref(), line, *json),
        Commands::Subtotal {
            file,
            invoice,
            line,
        } => _subtotal(&container, file, invoice, *line),
        Commands::Report {
            file,
            invoice,
            json,
        } => _report(&container, file, invoice.as_deref(), *json),
        Commands::Tree { file, invoice } => _tree(&container, file, invoice.as_deref()),
        Commands::Copy {
            file,
            invoice,
            to,
            output,
        } => _copy(&container, file, invoice, to, output.as_deref()),
        Commands::CopyLines {
            file,
            invoice,
            line,
            parent,
            description,
            quantity,
            unit_price,
            output,
        } => {
            let defaults = CopyDefaults {
                parent: None,
                description: description.clone(),
                quantity: *quantity,
                unit_price: *unit_price,
            };
            _copy_lines(
                &container,
                file,
                invoice,
                line,
                *parent,
                defaults,
                output.as_deref(),
            )
        }
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn resolve_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| CliError::Infra(InfraError::io("get current directory", e))),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| ApplicationError::OperationFailed {
        context: "serialize JSON output".to_string(),
        source: Box::new(e),
    })?;
    output::info(&text);
    Ok(())
}

fn select_trees<'a>(book: &'a Book, invoice: Option<&str>) -> CliResult<Vec<&'a InvoiceTree>> {
    match invoice {
        Some(id) => Ok(vec![book.require(&InvoiceId::new(id))?]),
        None => Ok(book.iter().collect()),
    }
}

#[instrument(skip(container))]
fn _number(
    container: &ServiceContainer,
    file: &Path,
    invoice: Option<&str>,
    lines: &[u64],
    json: bool,
) -> CliResult<()> {
    let book = container.invoices.load(file)?;
    let invoice = invoice.map(InvoiceId::new);
    let lines: Vec<LineId> = lines.iter().copied().map(LineId).collect();
    let rows = container.invoices.numbers(&book, invoice.as_ref(), &lines)?;

    if json {
        return print_json(&rows);
    }
    for row in rows {
        output::info(&format!(
            "{}\t{}\t{}",
            row.invoice,
            row.line,
            row.number.as_deref().unwrap_or("-")
        ));
    }
    Ok(())
}

#[instrument(skip(container))]
fn _subtotal(container: &ServiceContainer, file: &Path, invoice: &str, line: u64) -> CliResult<()> {
    let book = container.invoices.load(file)?;
    let invoice = InvoiceId::new(invoice);
    let amount = container.invoices.subtotal(&book, &invoice, LineId(line))?;
    let currency = &book.require(&invoice)?.currency().code;
    output::info(&format!("{amount} {currency}"));
    Ok(())
}

#[instrument(skip(container))]
fn _report(
    container: &ServiceContainer,
    file: &Path,
    invoice: Option<&str>,
    json: bool,
) -> CliResult<()> {
    let book = container.invoices.load(file)?;
    let invoice = invoice.map(InvoiceId::new);
    let rows = container.invoices.report(&book, invoice.as_ref())?;

    if json {
        return print_json(&rows);
    }
    let mut current: Option<&InvoiceId> = None;
    for row in &rows {
        if current != Some(&row.invoice) {
            output::header(&format!("{} ({})", row.invoice, row.currency));
            current = Some(&row.invoice);
        }
        let amount = if row.amount.is_zero() && row.line_type != LineType::Line {
            String::new()
        } else {
            row.amount.to_string()
        };
        output::detail(&format!(
            "{:<10} {:indent$}{} [{}] {}",
            row.number.as_deref().unwrap_or("-"),
            "",
            row.description,
            row.line_type,
            amount,
            indent = row.level * 2
        ));
    }
    Ok(())
}

#[instrument(skip(container))]
fn _tree(container: &ServiceContainer, file: &Path, invoice: Option<&str>) -> CliResult<()> {
    let book = container.invoices.load(file)?;
    for tree in select_trees(&book, invoice)? {
        let view = tree.to_tree_string(&container.settings.tree)?;
        output::info(&view);
        output::detail(&format!("{} lines, depth {}", tree.len(), tree.depth()));
    }
    Ok(())
}

#[instrument(skip(container))]
fn _copy(
    container: &ServiceContainer,
    file: &Path,
    invoice: &str,
    to: &str,
    out: Option<&Path>,
) -> CliResult<()> {
    let mut book = container.invoices.load(file)?;
    let copied =
        container
            .invoices
            .copy_invoice(&mut book, &InvoiceId::new(invoice), InvoiceId::new(to))?;
    let target = out.unwrap_or(file);
    container.invoices.save(&book, target)?;
    output::success(&format!(
        "copied invoice {invoice} to {to} ({copied} lines) -> {}",
        target.display()
    ));
    Ok(())
}

#[instrument(skip(container, defaults))]
fn _copy_lines(
    container: &ServiceContainer,
    file: &Path,
    invoice: &str,
    lines: &[u64],
    parent: Option<u64>,
    defaults: CopyDefaults,
    out: Option<&Path>,
) -> CliResult<()> {
    let mut book = container.invoices.load(file)?;
    let lines: Vec<LineId> = lines.iter().copied().map(LineId).collect();
    let new_roots = container.invoices.copy_lines(
        &mut book,
        &InvoiceId::new(invoice),
        &lines,
        parent.map(LineId),
        defaults,
    )?;
    let target = out.unwrap_or(file);
    container.invoices.save(&book, target)?;

    let ids: Vec<String> = new_roots.iter().map(ToString::to_string).collect();
    output::success(&format!(
        "copied {} subtrees in {invoice}, new lines: {} -> {}",
        new_roots.len(),
        ids.join(", "),
        target.display()
    ));
    Ok(())
}

#[instrument(skip(settings))]
fn _config(command: &ConfigCommands, settings: &Settings, dir: &Path) -> CliResult<()> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Path => {
            let global = global_config_path()
                .map(|p| with_state(&p))
                .unwrap_or_else(|| "<unavailable>".to_string());
            output::action("global", &global);
            output::action("local", &with_state(&local_config_path(dir)));
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}

fn with_state(path: &Path) -> String {
    let state = if path.exists() { "exists" } else { "missing" };
    format!("{} ({state})", path.display())
}

fn _completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
