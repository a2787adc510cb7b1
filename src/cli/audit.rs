//! Audit trail and ledger verification commands

use crate::display::backup::format_audit_entries;
use crate::error::LedgerResult;
use crate::models::TransactionType;
use crate::services::Ledger;

/// Print the most recent audit entries
pub fn handle_audit_command(ledger: &Ledger, limit: usize) -> LedgerResult<()> {
    let entries = ledger.audit().read_recent(limit)?;
    print!("{}", format_audit_entries(&entries));
    Ok(())
}

/// Replay the ledger and report any disagreement with stored balances
///
/// Returns whether the books are consistent.
pub fn handle_verify_command(ledger: &Ledger) -> LedgerResult<bool> {
    let symbol = ledger.settings().currency_symbol.as_str();
    let check = ledger.verify_ledger()?;

    println!("Checked {} ledger entries", check.entries);

    for mismatch in &check.mismatches {
        println!(
            "  Entry {} of account {} records {}, replay gives {}",
            mismatch.position,
            mismatch.account,
            mismatch.recorded.format_with_symbol(symbol),
            mismatch.replayed.format_with_symbol(symbol)
        );
    }

    for (number, cached, derived) in &check.diverged {
        println!(
            "  Account {} holds {}, ledger gives {}",
            number,
            cached.format_with_symbol(symbol),
            derived.format_with_symbol(symbol)
        );
    }

    for mismatch in &check.loan_mismatches {
        let what = match mismatch.kind {
            TransactionType::LoanDisbursal => "lent",
            _ => "repaid",
        };
        println!(
            "  Loans of account {} show {} {}, ledger gives {}",
            mismatch.account,
            mismatch.in_loans.format_with_symbol(symbol),
            what,
            mismatch.in_ledger.format_with_symbol(symbol)
        );
    }

    if check.is_consistent() {
        println!("Ledger is consistent.");
    } else {
        println!("Found {} inconsistency(ies).", check.problems());
    }

    Ok(check.is_consistent())
}
