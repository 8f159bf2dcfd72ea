//! Multi-step transaction flows
//!
//! Every transaction kind has a fixed, ordered list of steps that ends in a
//! confirmation step. While the matching transaction is pending, has a hash,
//! or failed, the flow is pinned to that confirmation step.

use serde::Serialize;

use crate::error::StepError;
use crate::transaction::{TransactionKind, TransactionRecord};

/// The kinds of step a flow can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Amount entry, checked against the minimum next bid
    BidInput,
    /// Outcome of the auction being settled
    SettleSummary,
    /// Relayer address entry
    RelayerForm,
    /// Tag name entry
    TagForm,
    /// Target URI the tag points at
    TargetUriForm,
    /// Review, sign and follow the submission
    Confirm,
}

/// Static presentation data for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepProps {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub kind: StepKind,
    pub props: StepProps,
}

const fn step(kind: StepKind, title: &'static str, description: &'static str) -> Step {
    Step {
        kind,
        props: StepProps { title, description },
    }
}

const BID_STEPS: &[Step] = &[
    step(StepKind::BidInput, "Place a bid", "Enter an amount at or above the minimum bid"),
    step(StepKind::Confirm, "Confirm bid", "Sign the bid in your wallet"),
];

const SETTLE_STEPS: &[Step] = &[
    step(StepKind::SettleSummary, "Settle auction", "Review the winning bid"),
    step(StepKind::Confirm, "Confirm settlement", "Sign the settlement in your wallet"),
];

const ADD_RELAYER_STEPS: &[Step] = &[
    step(StepKind::RelayerForm, "Add relayer", "Enter the relayer address"),
    step(StepKind::Confirm, "Confirm relayer", "Sign the change in your wallet"),
];

const REMOVE_RELAYER_STEPS: &[Step] = &[
    step(StepKind::RelayerForm, "Remove relayer", "Select the relayer to remove"),
    step(StepKind::Confirm, "Confirm removal", "Sign the change in your wallet"),
];

const CREATE_TAG_STEPS: &[Step] = &[
    step(StepKind::TagForm, "Create tag", "Choose a tag name"),
    step(StepKind::TargetUriForm, "Set target", "Enter the URI the tag resolves to"),
    step(StepKind::Confirm, "Confirm tag", "Sign the creation in your wallet"),
];

/// Ordered steps for a transaction kind
pub fn steps_for(kind: TransactionKind) -> &'static [Step] {
    match kind {
        TransactionKind::Bid => BID_STEPS,
        TransactionKind::Settle => SETTLE_STEPS,
        TransactionKind::AddRelayer => ADD_RELAYER_STEPS,
        TransactionKind::RemoveRelayer => REMOVE_RELAYER_STEPS,
        TransactionKind::CreateTag => CREATE_TAG_STEPS,
    }
}

/// Active step of one transaction flow
#[derive(Debug, Clone)]
pub struct StepOrchestrator {
    kind: TransactionKind,
    steps: &'static [Step],
    current: usize,
}

impl StepOrchestrator {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            steps: steps_for(kind),
            current: 0,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn last_step_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn current_step(&self) -> Step {
        self.steps[self.current]
    }

    pub fn current_step_kind(&self) -> StepKind {
        self.current_step().kind
    }

    pub fn current_step_props(&self) -> StepProps {
        self.current_step().props
    }

    pub fn is_last_step(&self) -> bool {
        self.current == self.last_step_index()
    }

    /// Follow the tracked transaction: pin to confirmation while it is in
    /// flight or has an outcome to show, otherwise start over
    pub fn sync(&mut self, record: Option<&TransactionRecord>) {
        let in_progress = record.map_or(false, |r| r.is_pending || r.hash.is_some() || r.is_error);
        self.current = if in_progress { self.last_step_index() } else { 0 };
    }

    pub fn go_to_next_step(&mut self) -> Result<(), StepError> {
        self.go_to_step(self.current + 1)
    }

    pub fn go_to_step(&mut self, index: usize) -> Result<(), StepError> {
        if index >= self.steps.len() {
            return Err(StepError::OutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        self.current = index;
        Ok(())
    }
}
