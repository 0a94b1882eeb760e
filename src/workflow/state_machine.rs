use statig::prelude::*;
use tracing::{debug, info};

use crate::dossier::{UploadFile, ValidationError};
use crate::workflow::{DateBranch, WorkflowSnapshot, WorkflowStep};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// User affirms the current deployment date
    Confirm,
    /// User disputes the date; carries the stored value to pre-fill the input
    Modify { current_date: String },
    DraftDateChanged(String),
    /// The new date was persisted by the backend
    DateSaved,
    CancelEdit,
    Back,
    FileSelected(UploadFile),
    FileCleared,
    TextChanged(String),
    /// Re-open an already provided system prompt for editing
    EditExisting { text: String },
    /// An upload or text save was confirmed by the backend
    Submitted,
    /// Fetched data changed; reconcile `proof_uploaded` and the step
    Synchronized(WorkflowSnapshot),
    DocumentDeleted,
    Failed(String),
    Reset,
}

/// Context of the unacceptable-case workflow.
///
/// Steps are statig states; `step` mirrors the active state so callers can
/// read it without matching on the generated enum.
#[derive(Debug, Default)]
pub struct UnacceptableCaseMachine {
    pub usecase_id: String,
    step: WorkflowStep,
    branch: Option<DateBranch>,
    proof_uploaded: bool,
    new_date: String,
    selected_file: Option<UploadFile>,
    text_content: String,
    editing_existing: bool,
    error: Option<String>,
}

impl UnacceptableCaseMachine {
    pub fn new(usecase_id: impl Into<String>) -> Self {
        Self {
            usecase_id: usecase_id.into(),
            ..Default::default()
        }
    }

    /// Build a running machine already reconciled with `snapshot`.
    ///
    /// When the proof is already provided this lands directly on the branch
    /// step instead of asking to confirm the date again.
    pub fn start(usecase_id: impl Into<String>, snapshot: WorkflowSnapshot) -> StateMachine<Self> {
        let mut machine = Self::new(usecase_id).state_machine();
        machine.handle(&WorkflowEvent::Synchronized(snapshot));
        machine
    }
}

#[state_machine(initial = "State::confirm_date()")]
impl UnacceptableCaseMachine {
    #[state]
    fn confirm_date(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Confirm => match self.branch {
                Some(branch) => {
                    info!(
                        usecase.id = %self.usecase_id,
                        branch = ?branch,
                        "Deployment date confirmed"
                    );
                    self.go_to(branch.step())
                }
                None => {
                    debug!(usecase.id = %self.usecase_id, "No deployment date to confirm");
                    Handled
                }
            },
            WorkflowEvent::Modify { current_date } => {
                self.new_date = current_date.clone();
                self.go_to(WorkflowStep::EditDate)
            }
            _ => self.on_any_step(event),
        }
    }

    #[state]
    fn edit_date(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::DraftDateChanged(date) => {
                self.new_date = date.clone();
                Handled
            }
            WorkflowEvent::DateSaved | WorkflowEvent::CancelEdit => {
                self.new_date.clear();
                self.go_to(WorkflowStep::ConfirmDate)
            }
            _ => self.on_any_step(event),
        }
    }

    #[state]
    fn upload_proof(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Back => self.go_to(WorkflowStep::ConfirmDate),
            WorkflowEvent::FileSelected(file) => {
                self.selected_file = Some(file.clone());
                self.error = None;
                Handled
            }
            WorkflowEvent::FileCleared => {
                self.selected_file = None;
                Handled
            }
            WorkflowEvent::Submitted => {
                self.clear_inputs();
                Handled
            }
            _ => self.on_any_step(event),
        }
    }

    #[state]
    fn future_deployment_warning(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Back => self.go_to(WorkflowStep::ConfirmDate),
            WorkflowEvent::FileSelected(file) => {
                self.selected_file = Some(file.clone());
                self.error = None;
                Handled
            }
            WorkflowEvent::FileCleared => {
                self.selected_file = None;
                Handled
            }
            WorkflowEvent::TextChanged(text) => {
                self.text_content = text.clone();
                self.error = None;
                Handled
            }
            WorkflowEvent::EditExisting { text } => {
                self.text_content = text.clone();
                self.editing_existing = true;
                self.error = None;
                Handled
            }
            WorkflowEvent::Submitted => {
                self.clear_inputs();
                Handled
            }
            _ => self.on_any_step(event),
        }
    }
}

impl UnacceptableCaseMachine {
    /// Events accepted whatever the current step.
    fn on_any_step(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::Synchronized(snapshot) => self.synchronize(snapshot),
            WorkflowEvent::DocumentDeleted => {
                self.proof_uploaded = false;
                self.clear_inputs();
                match self.branch {
                    Some(branch) => self.go_to(branch.step()),
                    None => self.go_to(WorkflowStep::ConfirmDate),
                }
            }
            WorkflowEvent::Failed(message) => {
                self.error = Some(message.clone());
                Handled
            }
            WorkflowEvent::Reset => {
                self.proof_uploaded = false;
                self.new_date.clear();
                self.clear_inputs();
                self.go_to(WorkflowStep::ConfirmDate)
            }
            _ => {
                debug!(step = %self.step, event = ?event, "Event ignored in current step");
                Handled
            }
        }
    }

    /// Compare-and-overwrite against fetched data. A no-op when nothing changed.
    fn synchronize(&mut self, snapshot: &WorkflowSnapshot) -> Outcome<State> {
        self.branch = snapshot.branch;
        let Some(branch) = snapshot.branch else {
            return Handled;
        };

        if snapshot.proof_uploaded == self.proof_uploaded {
            return Handled;
        }

        info!(
            usecase.id = %self.usecase_id,
            proof_uploaded = snapshot.proof_uploaded,
            "Proof status corrected from fetched documents"
        );
        self.proof_uploaded = snapshot.proof_uploaded;
        if self.proof_uploaded {
            self.clear_inputs();
        }
        self.go_to(branch.step())
    }

    fn go_to(&mut self, step: WorkflowStep) -> Outcome<State> {
        if step != self.step {
            info!(
                usecase.id = %self.usecase_id,
                from = %self.step,
                to = %step,
                proof_uploaded = self.proof_uploaded,
                "Workflow step changed"
            );
        }
        self.step = step;
        Transition(match step {
            WorkflowStep::ConfirmDate => State::confirm_date(),
            WorkflowStep::EditDate => State::edit_date(),
            WorkflowStep::UploadProof => State::upload_proof(),
            WorkflowStep::FutureDeploymentWarning => State::future_deployment_warning(),
        })
    }

    fn clear_inputs(&mut self) {
        self.selected_file = None;
        self.text_content.clear();
        self.editing_existing = false;
        self.error = None;
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn branch(&self) -> Option<DateBranch> {
        self.branch
    }

    pub fn proof_uploaded(&self) -> bool {
        self.proof_uploaded
    }

    pub fn new_date(&self) -> &str {
        &self.new_date
    }

    pub fn selected_file(&self) -> Option<&UploadFile> {
        self.selected_file.as_ref()
    }

    pub fn text_content(&self) -> &str {
        &self.text_content
    }

    pub fn is_editing_existing(&self) -> bool {
        self.editing_existing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Free text and a file are mutually exclusive for the system prompt.
    pub fn submission_block(&self) -> Option<ValidationError> {
        if !self.text_content.trim().is_empty() && self.selected_file.is_some() {
            Some(ValidationError::TextAndFileConflict)
        } else {
            None
        }
    }

    pub fn can_save_date(&self) -> bool {
        self.step == WorkflowStep::EditDate && !self.new_date.trim().is_empty()
    }

    pub fn can_upload(&self) -> bool {
        matches!(
            self.step,
            WorkflowStep::UploadProof | WorkflowStep::FutureDeploymentWarning
        ) && self.selected_file.is_some()
            && self.submission_block().is_none()
    }

    pub fn can_save_text(&self) -> bool {
        self.step == WorkflowStep::FutureDeploymentWarning
            && !self.text_content.trim().is_empty()
            && self.submission_block().is_none()
    }
}
