//! Display helpers for rupee amounts and percentages.

const CRORE: f64 = 10_000_000.0;
const LAKH: f64 = 100_000.0;

/// Indian notation: `₹1.50 Cr`, `₹2.00 L`, otherwise `₹50,000`.
pub fn format_inr(amount: f64) -> String {
    if amount >= CRORE {
        format!("₹{:.2} Cr", amount / CRORE)
    } else if amount >= LAKH {
        format!("₹{:.2} L", amount / LAKH)
    } else {
        format!("₹{}", group_thousands(amount.round() as i64))
    }
}

/// Percentage with an explicit sign for non-negative values: `+2.50%`.
pub fn format_percent(value: f64, decimals: usize) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}{value:.decimals$}%")
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}
