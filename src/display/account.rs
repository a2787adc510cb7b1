//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use crate::models::{Account, Loan, Money};

/// Format a list of accounts with balances as a table
pub fn format_account_list(accounts: &[Account], symbol: &str) -> String {
    if accounts.is_empty() {
        return "No accounts found.\n".to_string();
    }

    let name_width = accounts
        .iter()
        .map(|a| a.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<8}  {:<name_width$}  {:>14}  {}\n",
        "Number",
        "Name",
        "Balance",
        "Status",
        name_width = name_width,
    ));

    output.push_str(&format!(
        "{:-<8}  {:-<name_width$}  {:->14}  {:-<8}\n",
        "",
        "",
        "",
        "",
        name_width = name_width,
    ));

    for account in accounts {
        output.push_str(&format!(
            "{:<8}  {:<name_width$}  {:>14}  {}\n",
            account.number,
            account.name,
            account.balance.format_with_symbol(symbol),
            account.status(),
            name_width = name_width,
        ));
    }

    let total: Money = accounts.iter().map(|a| a.balance).sum();

    output.push_str(&format!(
        "{:-<8}  {:-<name_width$}  {:->14}\n",
        "",
        "",
        "",
        name_width = name_width,
    ));
    output.push_str(&format!(
        "{:<8}  {:<name_width$}  {:>14}\n",
        "TOTAL",
        "",
        total.format_with_symbol(symbol),
        name_width = name_width,
    ));

    output
}

/// Format a single account's details
///
/// The password hash is never shown.
pub fn format_account_details(account: &Account, loans: &[Loan], symbol: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.number));
    output.push_str(&format!("  Name:     {}\n", account.name));
    output.push_str(&format!("  Email:    {}\n", account.email));
    output.push_str(&format!("  Phone:    {}\n", account.phone));
    output.push_str(&format!("  Status:   {}\n", account.status()));
    output.push('\n');
    output.push_str(&format!(
        "  Balance:  {}\n",
        account.balance.format_with_symbol(symbol)
    ));

    let open: Vec<&Loan> = loans.iter().filter(|l| !l.is_repaid()).collect();
    if !open.is_empty() {
        let owed: Money = open.iter().map(|l| l.balance).sum();
        output.push_str(&format!(
            "  Loans:    {} open, {} outstanding\n",
            open.len(),
            owed.format_with_symbol(symbol)
        ));
    }

    output
}
