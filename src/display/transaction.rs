//! Transaction display formatting
//!
//! Register views of ledger entries and the account statement.

use crate::models::Transaction;
use crate::services::Statement;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a single ledger entry as a register row
pub fn format_transaction_row(txn: &Transaction, symbol: &str) -> String {
    format!(
        "{}  {:<14}  {:>14}  {:>14}",
        txn.timestamp.format(DATETIME_FORMAT),
        txn.kind.to_string(),
        txn.amount.format_with_symbol(symbol),
        txn.balance_after.format_with_symbol(symbol),
    )
}

/// Format a list of ledger entries as a register
pub fn format_transaction_register(transactions: &[Transaction], symbol: &str) -> String {
    if transactions.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:19}  {:<14}  {:>14}  {:>14}\n",
        "Date", "Type", "Amount", "Balance"
    ));
    output.push_str(&"-".repeat(67));
    output.push('\n');

    for txn in transactions {
        output.push_str(&format_transaction_row(txn, symbol));
        output.push('\n');
    }

    output
}

/// Format an account statement
pub fn format_statement(statement: &Statement, symbol: &str) -> String {
    let account = &statement.account;
    let mut output = String::new();

    output.push_str(&format!("Statement for account {}\n", account.number));
    output.push_str(&format!("  Holder:    {}\n", account.name));
    output.push_str(&format!(
        "  Generated: {}\n",
        statement.generated_at.format(DATETIME_FORMAT)
    ));
    output.push_str(&format!("  Status:    {}\n", account.status()));
    output.push('\n');

    output.push_str(&format_transaction_register(&statement.transactions, symbol));
    output.push('\n');

    output.push_str(&format!(
        "  Money in:  {:>14}\n",
        statement.total_in.format_with_symbol(symbol)
    ));
    output.push_str(&format!(
        "  Money out: {:>14}\n",
        statement.total_out.format_with_symbol(symbol)
    ));
    output.push_str(&format!(
        "  Balance:   {:>14}\n",
        account.balance.format_with_symbol(symbol)
    ));

    if !statement.loans.is_empty() {
        output.push('\n');
        output.push_str(&super::loan::format_loan_list(&statement.loans, symbol));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountNumber, Money, TransactionType};
    use chrono::NaiveDate;

    fn number() -> AccountNumber {
        AccountNumber::new(123456).unwrap()
    }

    fn txn(kind: TransactionType, amount: i64, balance: i64) -> Transaction {
        Transaction::new(
            number(),
            kind,
            Money::from_cents(amount),
            Money::from_cents(balance),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_format_row() {
        let row = format_transaction_row(&txn(TransactionType::Deposit, 50000, 50000), "$");
        assert!(row.starts_with("2024-03-01 09:30:00"));
        assert!(row.contains("DEPOSIT"));
        assert!(row.contains("$500.00"));
    }

    #[test]
    fn test_format_empty_register() {
        assert_eq!(format_transaction_register(&[], "$"), "No transactions found.\n");
    }

    #[test]
    fn test_format_statement() {
        let mut account = Account::new(number(), "Asha", "a@example.com", "5551234", "hash");
        account.balance = Money::from_cents(30000);

        let statement = Statement {
            account,
            generated_at: NaiveDate::from_ymd_opt(2024, 3, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            transactions: vec![
                txn(TransactionType::Deposit, 50000, 50000),
                txn(TransactionType::TransferOut, 20000, 30000),
            ],
            loans: Vec::new(),
            total_in: Money::from_cents(50000),
            total_out: Money::from_cents(20000),
        };

        let output = format_statement(&statement, "$");
        assert!(output.contains("Statement for account 123456"));
        assert!(output.contains("TRANSFER_OUT"));
        assert!(output.contains("$200.00"));
        assert!(output.contains("$300.00"));
        assert!(!output.contains("Loans"));
    }
}
