//! Integration tests for chapter subtotals and line amounts.

use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rschapter::config::Settings;
use rschapter::domain::{
    line_amount, line_amounts, subtotal_at, Book, BookRecord, Currency, DomainError, InvoiceId,
    InvoiceTree, Line, LineId, LineType, TreeBuilder,
};

fn item(id: u64, quantity: Decimal, unit_price: Decimal) -> Line {
    Line::new(LineId(id), LineType::Line, format!("item {id}")).with_amounts(quantity, unit_price)
}

fn subtotal(id: u64) -> Line {
    Line::new(LineId(id), LineType::Subtotal, format!("subtotal {id}"))
}

fn sample_book() -> Book {
    let record: BookRecord =
        toml::from_str(include_str!("resources/invoices/sample.toml")).unwrap();
    let settings = Settings::default();
    TreeBuilder::new()
        .build_book(&record, |code| settings.currency(code))
        .unwrap()
}

#[test]
fn given_two_subtotals_in_chapter_when_computing_then_second_restarts_after_first() {
    // Arrange: chapter T[line(10), line(5), S1, line(3), S2]
    let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::default());
    let chapter = tree
        .insert_line(Line::new(LineId(1), LineType::Title, "T"), None)
        .unwrap();
    tree.insert_line(item(2, dec!(1), dec!(10)), Some(chapter)).unwrap();
    tree.insert_line(item(3, dec!(1), dec!(5)), Some(chapter)).unwrap();
    let s1 = tree.insert_line(subtotal(4), Some(chapter)).unwrap();
    tree.insert_line(item(5, dec!(1), dec!(3)), Some(chapter)).unwrap();
    let s2 = tree.insert_line(subtotal(6), Some(chapter)).unwrap();

    // Act & Assert
    assert_eq!(subtotal_at(&tree, s1).unwrap(), dec!(15));
    assert_eq!(subtotal_at(&tree, s2).unwrap(), dec!(3));
}

#[test]
fn given_nested_chapter_before_subtotal_when_computing_then_includes_its_total() {
    // Arrange: chapter T[line(10), C[line(4), line(3)], S1]
    let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::default());
    let chapter = tree
        .insert_line(Line::new(LineId(1), LineType::Title, "T"), None)
        .unwrap();
    tree.insert_line(item(2, dec!(1), dec!(10)), Some(chapter)).unwrap();
    let nested = tree
        .insert_line(Line::new(LineId(3), LineType::Title, "C"), Some(chapter))
        .unwrap();
    tree.insert_line(item(4, dec!(1), dec!(4)), Some(nested)).unwrap();
    tree.insert_line(item(5, dec!(1), dec!(3)), Some(nested)).unwrap();
    let s1 = tree.insert_line(subtotal(6), Some(chapter)).unwrap();

    // Act
    let result = subtotal_at(&tree, s1).unwrap();

    // Assert
    assert_eq!(result, dec!(17));
}

#[test]
fn given_plain_line_when_computing_chapter_subtotal_then_rejects() {
    let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::default());
    let chapter = tree
        .insert_line(Line::new(LineId(1), LineType::Title, "T"), None)
        .unwrap();
    let line = tree.insert_line(item(2, dec!(1), dec!(10)), Some(chapter)).unwrap();

    let err = subtotal_at(&tree, line).unwrap_err();

    assert_eq!(err, DomainError::NotChapterSubtotal(LineId(2)));
}

#[test]
fn given_comment_and_title_when_computing_amount_then_both_are_zero() {
    let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::default());
    let chapter = tree
        .insert_line(Line::new(LineId(1), LineType::Title, "T"), None)
        .unwrap();
    let comment = tree
        .insert_line(
            Line::new(LineId(2), LineType::Comment, "note").with_amounts(dec!(3), dec!(3)),
            Some(chapter),
        )
        .unwrap();

    assert_eq!(line_amount(&tree, chapter).unwrap(), Decimal::ZERO);
    assert_eq!(line_amount(&tree, comment).unwrap(), Decimal::ZERO);
}

// ============================================================
// Sample invoice file
// ============================================================

#[rstest]
#[case("INV-2024-001", 2, dec!(125.00))]
#[case("INV-2024-001", 6, dec!(411.00))]
#[case("INV-2024-001", 7, dec!(100.00))]
#[case("INV-2024-001", 8, dec!(225.00))]
#[case("INV-2024-001", 12, dec!(145.00))]
#[case("INV-2024-002", 2, dec!(1234.55))]
#[case("INV-2024-002", 3, dec!(1234.55))]
fn given_sample_file_when_computing_amounts_then_matches_expected(
    #[case] invoice: &str,
    #[case] line: u64,
    #[case] expected: Decimal,
) {
    // Arrange
    let book = sample_book();
    let tree = book.require(&InvoiceId::new(invoice)).unwrap();

    // Act
    let amounts = line_amounts(tree).unwrap();

    // Assert
    assert_eq!(amounts[&LineId(line)], expected);
}

// ============================================================
// Amount overflow
// ============================================================

#[test]
fn given_quantity_beyond_cent_range_when_computing_amounts_then_reports_overflow() {
    // Arrange
    let content = r#"
[[invoices]]
id = "INV-HUGE"

[[invoices.lines]]
id = 1
type = "line"
description = "too much"
quantity = "1000000000000000000000000000"
unit_price = "1"
"#;
    let record: BookRecord = toml::from_str(content).unwrap();
    let settings = Settings::default();
    let book = TreeBuilder::new()
        .build_book(&record, |code| settings.currency(code))
        .unwrap();
    let tree = book.require(&InvoiceId::new("INV-HUGE")).unwrap();

    // Act
    let result = line_amounts(tree);

    // Assert
    assert_eq!(result, Err(DomainError::AmountOverflow { line: LineId(1) }));
}

#[test]
fn given_chapter_sum_beyond_decimal_range_when_computing_subtotal_then_reports_overflow() {
    // Arrange: two lines of 5e28 each under a whole-unit currency
    let mut tree = InvoiceTree::new(InvoiceId::new("INV-1"), Currency::new("JPY", dec!(1), 0));
    let chapter = tree
        .insert_line(Line::new(LineId(1), LineType::Title, "T"), None)
        .unwrap();
    let half = dec!(50000000000000000000000000000);
    tree.insert_line(item(2, dec!(1), half), Some(chapter)).unwrap();
    tree.insert_line(item(3, dec!(1), half), Some(chapter)).unwrap();
    let s = tree.insert_line(subtotal(4), Some(chapter)).unwrap();

    // Act
    let result = subtotal_at(&tree, s);

    // Assert
    assert_eq!(result, Err(DomainError::AmountOverflow { line: LineId(3) }));
}
