//! Unacceptable-case workflow: date branching, the step machine and the
//! controller that drives it against the backend.

pub mod branch;
pub mod controller;
pub mod state_machine;

pub use branch::{
    date_branch, format_date_for_input, is_unacceptable_case, parse_deployment_date,
    proof_uploaded, required_document, DateBranch, Documents, WorkflowSnapshot, WorkflowStep,
};
pub use controller::{RefreshTicket, UnacceptableCaseWorkflow, WorkflowError};
pub use state_machine::{UnacceptableCaseMachine, WorkflowEvent};
