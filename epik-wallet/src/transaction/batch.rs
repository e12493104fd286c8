//! Submitting many drafts with per-target outcomes

use std::collections::BTreeMap;

use ethers_core::types::U256;
use tracing::{info, warn};

use super::cid::Cid;
use super::node::ChainNode;
use super::pipeline::{MessageDraft, MessageSender};
use crate::address::Address;
use crate::error::{Error, Result};

/// Outcome of one draft in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub target: Address,
    pub result: Result<Cid>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes in submission order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&Address, &Cid)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|cid| (&o.target, cid)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Address, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.target, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(BatchOutcome::is_success)
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && !self.outcomes.iter().any(BatchOutcome::is_success)
    }

    /// Some, but not all, drafts went through
    pub fn is_partial(&self) -> bool {
        !self.all_succeeded() && !self.all_failed()
    }
}

impl<'a, N: ChainNode + ?Sized> MessageSender<'a, N> {
    /// Push each draft in order, continuing past failures.
    ///
    /// With `check_balance`, every sender's balance must cover the total value
    /// of its drafts before anything is submitted; otherwise the whole batch
    /// fails with `InsufficientBalance`. Senders are resolved up front, so a
    /// missing key or default also fails the batch before any remote call.
    pub async fn push_batch(&self, drafts: Vec<MessageDraft>, check_balance: bool) -> Result<BatchReport> {
        let mut resolved = Vec::with_capacity(drafts.len());
        let mut totals: BTreeMap<Address, U256> = BTreeMap::new();
        for draft in drafts {
            let from = self.resolve_sender(draft.from.as_ref())?;
            let total = totals.entry(from.clone()).or_insert_with(U256::zero);
            *total = total.saturating_add(draft.value);
            resolved.push(draft.from(from));
        }

        if check_balance {
            for (from, total) in &totals {
                self.ensure_balance(from, *total).await?;
            }
        }

        let mut report = BatchReport::default();
        for draft in resolved {
            let target = draft.to.clone();
            let result = self.push(draft).await;
            if let Err(e) = &result {
                warn!(to = %target, error = %e, "batch message failed");
            }
            report.outcomes.push(BatchOutcome { target, result });
        }

        info!(
            total = report.outcomes.len(),
            failed = report.failed().count(),
            "batch submitted"
        );
        Ok(report)
    }
}
