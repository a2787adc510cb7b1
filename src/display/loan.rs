//! Loan display formatting

use crate::models::{AmortizationRow, Loan};

/// Format an account's loans with their 1-based indices
pub fn format_loan_list(loans: &[Loan], symbol: &str) -> String {
    if loans.is_empty() {
        return "No loans found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Loans\n");
    output.push_str(&format!(
        "{:>3}  {:>12}  {:>7}  {:>5}  {:10}  {:>12}  {:>12}  {}\n",
        "#", "Principal", "Rate", "Term", "Start", "Payment", "Balance", "Status"
    ));
    output.push_str(&"-".repeat(88));
    output.push('\n');

    for (i, loan) in loans.iter().enumerate() {
        output.push_str(&format!(
            "{:>3}  {:>12}  {:>6}%  {:>5}  {:10}  {:>12}  {:>12}  {}\n",
            i + 1,
            loan.principal.format_with_symbol(symbol),
            loan.interest_rate.normalize().to_string(),
            loan.term_months,
            loan.start_date.format("%Y-%m-%d").to_string(),
            loan.monthly_payment.format_with_symbol(symbol),
            loan.balance.format_with_symbol(symbol),
            if loan.is_repaid() { "Repaid" } else { "Open" },
        ));
    }

    output
}

/// Format an amortization schedule
pub fn format_schedule(rows: &[AmortizationRow], symbol: &str) -> String {
    if rows.is_empty() {
        return "Nothing left to repay.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:>6}  {:>12}  {:>12}  {:>12}  {:>12}\n",
        "Period", "Payment", "Interest", "Principal", "Remaining"
    ));
    output.push_str(&"-".repeat(62));
    output.push('\n');

    for row in rows {
        output.push_str(&format!(
            "{:>6}  {:>12}  {:>12}  {:>12}  {:>12}\n",
            row.period,
            row.payment.format_with_symbol(symbol),
            row.interest.format_with_symbol(symbol),
            row.principal.format_with_symbol(symbol),
            row.remaining.format_with_symbol(symbol),
        ));
    }

    output
}
