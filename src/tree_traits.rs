//! Terminal tree views of invoices.

use std::collections::{BTreeMap, HashSet};

use generational_arena::Index;
use rust_decimal::Decimal;
use termtree::Tree;
use tracing::instrument;

use crate::config::TreeConfig;
use crate::domain::{
    line_amounts, number_tree, DomainError, DomainResult, InvoiceRoots, InvoiceTree, LineId,
    LineType,
};

pub trait TreeNodeConvert {
    fn to_tree_string(&self, view: &TreeConfig) -> DomainResult<Tree<String>>;
}

struct Labels {
    numbers: BTreeMap<LineId, String>,
    amounts: BTreeMap<LineId, Decimal>,
}

impl TreeNodeConvert for InvoiceTree {
    #[instrument(level = "debug", skip_all, fields(invoice = %self.invoice()))]
    fn to_tree_string(&self, view: &TreeConfig) -> DomainResult<Tree<String>> {
        let labels = Labels {
            numbers: number_tree(&InvoiceRoots, self)?,
            amounts: if view.show_amounts {
                line_amounts(self)?
            } else {
                BTreeMap::new()
            },
        };

        let root = format!("{} ({})", self.invoice(), self.currency().code);
        let mut visited = HashSet::new();
        let leaves = self
            .roots()
            .iter()
            .map(|&idx| build_tree(self, idx, view, &labels, &mut visited))
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Tree::new(root).with_leaves(leaves))
    }
}

fn build_tree(
    tree: &InvoiceTree,
    idx: Index,
    view: &TreeConfig,
    labels: &Labels,
    visited: &mut HashSet<Index>,
) -> DomainResult<Tree<String>> {
    let node = tree
        .get_node(idx)
        .ok_or_else(|| DomainError::Internal("dangling child index".to_string()))?;
    if !visited.insert(idx) {
        return Err(DomainError::CycleDetected {
            invoice: tree.invoice().clone(),
            line: node.line.id,
        });
    }

    let line = &node.line;
    let mut text = match labels.numbers.get(&line.id) {
        Some(number) => format!("{number} {}", line.description),
        None => line.description.clone(),
    };
    if line.line_type != LineType::Line {
        text.push_str(&format!(" [{}]", line.line_type));
    }
    if let Some(amount) = labels.amounts.get(&line.id) {
        if line.line_type != LineType::Title && line.line_type != LineType::Comment {
            text.push_str(&format!(" = {amount}"));
        }
    }
    if view.show_wbs {
        if let Some(wbs) = &line.wbs {
            text.push_str(&format!(" <{wbs}>"));
        }
    }

    let leaves = node
        .children
        .iter()
        .map(|&child| build_tree(tree, child, view, labels, visited))
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(Tree::new(text).with_leaves(leaves))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, InvoiceId, Line};
    use rust_decimal_macros::dec;

    #[test]
    fn given_nested_lines_when_rendering_then_shows_numbers_and_amounts() {
        let mut tree = InvoiceTree::new(InvoiceId::new("INV-T"), Currency::default());
        let a = tree
            .insert_line(Line::new(LineId(1), LineType::Title, "Groundwork"), None)
            .unwrap();
        tree.insert_line(
            Line::new(LineId(2), LineType::Line, "Excavation")
                .with_amounts(dec!(10), dec!(12.50))
                .with_wbs("WBS-1.1"),
            Some(a),
        )
        .unwrap();

        let view = TreeConfig {
            show_amounts: true,
            show_wbs: true,
        };
        let rendered = tree.to_tree_string(&view).unwrap().to_string();

        assert!(rendered.starts_with("INV-T (EUR)"));
        assert!(rendered.contains("1 Groundwork [title]"));
        assert!(rendered.contains("1.1 Excavation = 125.00 <WBS-1.1>"));
    }
}
