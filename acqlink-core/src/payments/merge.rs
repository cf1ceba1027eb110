//! Folding a gateway [`PaymentReply`] into a stored transaction.

use acqlink_sdk::objects::PaymentReply;

use crate::entities::TransactionStatus;
use crate::entities::payment_transaction::PaymentTransaction;

/// Status the reply asks for, or `None` when it carries no usable verdict.
pub fn status_from_reply(reply: &PaymentReply) -> Option<TransactionStatus> {
    reply.outcome().map(TransactionStatus::from)
}

/// Field-level changes made by [`apply_reply`], in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    changes: Vec<String>,
}

impl MergeReport {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// `Field ('old'->'new')` entries joined by `, `.
    pub fn change_log(&self) -> String {
        self.changes.join(", ")
    }

    fn record(&mut self, field: &str, from: impl std::fmt::Display, to: impl std::fmt::Display) {
        self.changes.push(format!("{field} ('{from}'->'{to}')"));
    }
}

struct Shown<'a, T>(&'a Option<T>);

impl<T: std::fmt::Display> std::fmt::Display for Shown<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => value.fmt(f),
            None => f.write_str("null"),
        }
    }
}

/// Copy amount, balance, description and status from `reply` into
/// `transaction`.
///
/// Absent reply fields never clear stored values. Decimals compare by value
/// (`10.50` equals `10.5`) but keep the reply's scale when they change. A
/// terminal status is never replaced.
pub fn apply_reply(transaction: &mut PaymentTransaction, reply: &PaymentReply) -> MergeReport {
    let mut report = MergeReport::default();

    if let Some(amount) = reply.amount
        && amount.normalize() != transaction.amount.normalize()
    {
        report.record("Amount", transaction.amount.normalize(), amount.normalize());
        transaction.amount = amount;
    }

    if let Some(balance) = reply.balance
        && transaction.balance.map(|b| b.normalize()) != Some(balance.normalize())
    {
        report.record(
            "Balance",
            Shown(&transaction.balance.map(|b| b.normalize())),
            balance.normalize(),
        );
        transaction.balance = Some(balance);
    }

    if let Some(detail) = reply.detail.as_deref()
        && transaction.status_description.as_deref() != Some(detail)
    {
        report.record("Status Description", Shown(&transaction.status_description), detail);
        transaction.status_description = Some(detail.to_string());
    }

    if let Some(status) = status_from_reply(reply)
        && status != transaction.status
    {
        if transaction.status.is_terminal() {
            tracing::warn!(
                transaction_id = %transaction.id,
                current = %transaction.status,
                reported = %status,
                "Ignoring status change for terminal transaction"
            );
        } else {
            report.record("Status", transaction.status, status);
            transaction.status = status;
        }
    }

    report
}
