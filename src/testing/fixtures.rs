//! Pre-built catalogs and trade inputs.

use crate::catalog::Catalog;

/// Header row of a well-formed trade input.
pub const TRADE_HEADER: &str = "date,product_id,currency,price";

/// Product entries used across the test suite.
#[must_use]
pub fn sample_products() -> Vec<(&'static str, &'static str)> {
    vec![
        ("1", "Treasury Bills Domestic"),
        ("2", "Corporate Bonds Domestic"),
        ("3", "REPO Domestic"),
        ("4", "Interest rate swaps International"),
    ]
}

#[must_use]
pub fn sample_catalog() -> Catalog {
    Catalog::from_pairs(sample_products())
}

/// Render `rows` as trade CSV text under [`TRADE_HEADER`].
#[must_use]
pub fn trade_csv<R: AsRef<[&'static str]>>(rows: &[R]) -> String {
    let mut out = String::from(TRADE_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.as_ref().join(","));
        out.push('\n');
    }
    out
}

/// `n` deterministic trade rows with unique prices, so output order can be
/// checked against input order.
///
/// Every seventh row carries an invalid date and every fifth row a product id
/// outside [`sample_products`].
#[must_use]
pub fn generated_trades(n: usize) -> String {
    let mut out = String::from(TRADE_HEADER);
    out.push('\n');
    for i in 0..n {
        let date = if i % 7 == 6 {
            format!("2024-{:02}-01", 1 + i % 12)
        } else {
            format!("2024{:02}{:02}", 1 + i % 12, 1 + i % 28)
        };
        let product = if i % 5 == 4 { 99 } else { 1 + i % 4 };
        out.push_str(&format!("{date},{product},EUR,{i}.00\n"));
    }
    out
}

/// Expected output prices for [`generated_trades`], in order.
#[must_use]
pub fn generated_accepted_prices(n: usize) -> Vec<String> {
    (0..n).filter(|i| i % 7 != 6).map(|i| format!("{i}.00")).collect()
}
