use chrono::{Local, NaiveDate};
use statig::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::api::{ApiError, Document, DossierApi, UseCase, UseCaseNextSteps};
use crate::dossier::{
    ActionOutcome, DocType, DocumentForm, DossierError, DossierService, UploadFile,
    ValidationError,
};
use crate::observability::ActionTimer;
use crate::telemetry::{create_workflow_span, generate_correlation_id};
use crate::workflow::{
    format_date_for_input, is_unacceptable_case, parse_deployment_date, DateBranch, Documents,
    UnacceptableCaseMachine, WorkflowEvent, WorkflowSnapshot, WorkflowStep,
};

const SYSTEM_INSTRUCTIONS_KEY: &str = "system_instructions";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Une action est déjà en cours ({0}), veuillez patienter")]
    ActionInProgress(&'static str),
    #[error("Le cas d'usage {usecase_id} n'est pas classé à risque inacceptable")]
    NotUnacceptable { usecase_id: String },
    #[error("Cette action n'est pas disponible à l'étape {0}")]
    NotAvailable(WorkflowStep),
}

impl From<DossierError> for WorkflowError {
    fn from(err: DossierError) -> Self {
        match err {
            DossierError::Api(err) => WorkflowError::Api(err),
            DossierError::Validation(err) => WorkflowError::Validation(err),
        }
    }
}

impl WorkflowError {
    /// Human-readable French message shown inline under the current step.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Generation captured when a refresh starts. A refresh applied after a newer
/// mutation carries an older generation and is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

/// Drives the unacceptable-case workflow of one use case against the backend.
///
/// Holds the fetched use case and its two relevant documents. Every change to
/// that data is followed by an explicit `Synchronized` event so the step
/// machine never reads fetched data behind its back.
pub struct UnacceptableCaseWorkflow<A> {
    service: DossierService<A>,
    use_case: UseCase,
    documents: Documents,
    machine: StateMachine<UnacceptableCaseMachine>,
    next_steps: Option<UseCaseNextSteps>,
    next_steps_error: Option<String>,
    busy: Option<ActionTimer>,
    generation: u64,
    pinned_today: Option<NaiveDate>,
}

impl<A: DossierApi> UnacceptableCaseWorkflow<A> {
    pub async fn load(service: DossierService<A>, usecase_id: &str) -> Result<Self, WorkflowError> {
        Self::load_inner(service, usecase_id, None).await
    }

    /// Same as [`load`](Self::load) with "today" fixed, for reproducible branching.
    pub async fn load_at(
        service: DossierService<A>,
        usecase_id: &str,
        today: NaiveDate,
    ) -> Result<Self, WorkflowError> {
        Self::load_inner(service, usecase_id, Some(today)).await
    }

    async fn load_inner(
        service: DossierService<A>,
        usecase_id: &str,
        pinned_today: Option<NaiveDate>,
    ) -> Result<Self, WorkflowError> {
        let span = create_workflow_span("load", Some(usecase_id), Some(&generate_correlation_id()));
        async move {
            let use_case = service.api().fetch_use_case(usecase_id).await?;
            if !use_case.is_unacceptable_risk() {
                return Err(WorkflowError::NotUnacceptable {
                    usecase_id: usecase_id.to_string(),
                });
            }
            let (documents, next_steps) = tokio::join!(
                fetch_documents(service.api(), usecase_id),
                service.api().fetch_next_steps(usecase_id)
            );
            let mut workflow = Self::from_parts(service, use_case, documents?, pinned_today);
            match next_steps {
                Ok(next_steps) => workflow.next_steps = next_steps,
                Err(err) => {
                    warn!(error = %err, "Next steps unavailable, continuing without them");
                    workflow.next_steps_error = Some(err.to_string());
                }
            }
            info!(
                step = %workflow.step(),
                proof_uploaded = workflow.state().proof_uploaded(),
                "Unacceptable-case workflow loaded"
            );
            Ok(workflow)
        }
        .instrument(span)
        .await
    }

    /// Build a workflow from data already fetched.
    pub fn from_parts(
        service: DossierService<A>,
        use_case: UseCase,
        documents: Documents,
        pinned_today: Option<NaiveDate>,
    ) -> Self {
        let today = pinned_today.unwrap_or_else(|| Local::now().date_naive());
        let snapshot = WorkflowSnapshot::derive(&use_case, &documents, today);
        let machine = UnacceptableCaseMachine::start(use_case.id.clone(), snapshot);
        Self {
            service,
            use_case,
            documents,
            machine,
            next_steps: None,
            next_steps_error: None,
            busy: None,
            generation: 0,
            pinned_today,
        }
    }

    pub fn use_case(&self) -> &UseCase {
        &self.use_case
    }

    pub fn documents(&self) -> &Documents {
        &self.documents
    }

    pub fn document(&self, doc_type: DocType) -> Option<&Document> {
        self.documents.get(&doc_type)
    }

    pub fn service(&self) -> &DossierService<A> {
        &self.service
    }

    /// Recommendations loaded with the workflow, if the backend had any.
    pub fn next_steps(&self) -> Option<&UseCaseNextSteps> {
        self.next_steps.as_ref()
    }

    /// Why the recommendations could not be loaded. The workflow runs without them.
    pub fn next_steps_error(&self) -> Option<&str> {
        self.next_steps_error.as_deref()
    }

    /// Context of the step machine: step, inputs, inline error.
    pub fn state(&self) -> &UnacceptableCaseMachine {
        self.machine.inner()
    }

    pub fn step(&self) -> WorkflowStep {
        self.machine.inner().step()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn today(&self) -> NaiveDate {
        self.pinned_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot::derive(&self.use_case, &self.documents, self.today())
    }

    /// Document the current branch asks for.
    pub fn required_document(&self) -> Option<DocType> {
        self.snapshot().required_doc
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket {
            generation: self.generation,
        }
    }

    /// Apply data fetched for `ticket`. Returns false when a mutation happened
    /// since the ticket was taken; the data is then dropped.
    pub fn apply_refresh(
        &mut self,
        ticket: RefreshTicket,
        use_case: UseCase,
        documents: Documents,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                usecase.id = %self.use_case.id,
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale refresh"
            );
            return false;
        }
        self.use_case = use_case;
        self.documents = documents;
        self.synchronize();
        true
    }

    /// Refetch the use case and its documents from the backend, then
    /// reconcile the step. Cached reads are dropped first so changes made
    /// outside this workflow are seen.
    pub async fn refresh(&mut self) -> Result<bool, WorkflowError> {
        self.ensure_idle()?;
        let ticket = self.begin_refresh();
        let usecase_id = self.use_case.id.clone();
        let api = self.service.api();
        api.invalidate_usecase(&usecase_id).await;
        let fetched = tokio::try_join!(
            api.fetch_use_case(&usecase_id),
            fetch_documents(api, &usecase_id)
        );
        match fetched {
            Ok((use_case, documents)) => Ok(self.apply_refresh(ticket, use_case, documents)),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    pub fn confirm_date(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        if self.state().branch().is_none() {
            return Err(self.fail(ValidationError::NoDeploymentDate.into()));
        }
        self.machine.handle(&WorkflowEvent::Confirm);
        Ok(())
    }

    /// Open the date editor pre-filled with the stored date.
    pub fn modify_date(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        let current_date = format_date_for_input(self.use_case.deployment_date.as_deref());
        self.machine.handle(&WorkflowEvent::Modify { current_date });
        Ok(())
    }

    pub fn set_draft_date(&mut self, date: impl Into<String>) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.machine
            .handle(&WorkflowEvent::DraftDateChanged(date.into()));
        Ok(())
    }

    pub fn cancel_edit(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.machine.handle(&WorkflowEvent::CancelEdit);
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.machine.handle(&WorkflowEvent::Back);
        Ok(())
    }

    /// Only the upload and future-deployment steps take a file.
    pub fn select_file(&mut self, file: UploadFile) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.ensure_step(&[WorkflowStep::UploadProof, WorkflowStep::FutureDeploymentWarning])?;
        self.machine.handle(&WorkflowEvent::FileSelected(file));
        Ok(())
    }

    pub fn clear_file(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.machine.handle(&WorkflowEvent::FileCleared);
        Ok(())
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.ensure_step(&[WorkflowStep::FutureDeploymentWarning])?;
        self.machine.handle(&WorkflowEvent::TextChanged(text.into()));
        Ok(())
    }

    /// Re-open the saved system instructions for editing.
    pub fn edit_existing(&mut self) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.ensure_step(&[WorkflowStep::FutureDeploymentWarning])?;
        let text = self
            .document(DocType::SystemPrompt)
            .and_then(|doc| doc.text_field(SYSTEM_INSTRUCTIONS_KEY))
            .unwrap_or_default();
        self.machine.handle(&WorkflowEvent::EditExisting { text });
        Ok(())
    }

    /// Persist the draft deployment date, then re-derive the branch.
    pub async fn save_date(&mut self) -> Result<(), WorkflowError> {
        self.begin("save_date")?;
        let span = self.span("save_date");
        let result = self.run_save_date().instrument(span).await;
        self.finish(result)
    }

    async fn run_save_date(&mut self) -> Result<(), WorkflowError> {
        let draft = self.state().new_date().trim().to_string();
        if draft.is_empty() {
            return Err(ValidationError::MissingDate.into());
        }
        let date = parse_deployment_date(&draft)
            .ok_or_else(|| ValidationError::InvalidDate(draft.clone()))?;
        let formatted = date.format("%Y-%m-%d").to_string();

        let updated = self
            .service
            .api()
            .update_deployment_date(&self.use_case.id, &formatted)
            .await?;
        info!(deployment_date = %formatted, "Deployment date updated");
        self.use_case = updated;
        self.generation += 1;
        self.machine.handle(&WorkflowEvent::DateSaved);

        match fetch_documents(self.service.api(), &self.use_case.id).await {
            Ok(documents) => self.documents = documents,
            Err(err) => warn!(error = %err, "Document refetch after date change failed"),
        }
        self.synchronize();
        Ok(())
    }

    /// Upload the selected file as the document the branch requires.
    pub async fn upload_proof(&mut self) -> Result<ActionOutcome, WorkflowError> {
        self.begin("upload_proof")?;
        let span = self.span("upload_proof");
        let result = self.run_upload_proof().instrument(span).await;
        self.finish(result)
    }

    async fn run_upload_proof(&mut self) -> Result<ActionOutcome, WorkflowError> {
        let doc_type = self.branch_document()?;
        if let Some(conflict) = self.state().submission_block() {
            return Err(conflict.into());
        }
        let file = self
            .state()
            .selected_file()
            .cloned()
            .ok_or(ValidationError::MissingFile)?;

        let outcome = self
            .service
            .upload_file(&self.use_case.id, doc_type, &file)
            .await?;
        self.record(&outcome);
        self.machine.handle(&WorkflowEvent::Submitted);
        self.synchronize();
        Ok(outcome)
    }

    /// Save the typed system instructions (future deployment only).
    pub async fn save_text(&mut self) -> Result<ActionOutcome, WorkflowError> {
        self.begin("save_text")?;
        let span = self.span("save_text");
        let result = self.run_save_text().instrument(span).await;
        self.finish(result)
    }

    async fn run_save_text(&mut self) -> Result<ActionOutcome, WorkflowError> {
        if self.state().branch() != Some(DateBranch::Future) {
            return Err(WorkflowError::NotAvailable(self.step()));
        }
        if let Some(conflict) = self.state().submission_block() {
            return Err(conflict.into());
        }
        let instructions = self.state().text_content().trim().to_string();
        if instructions.is_empty() {
            return Err(ValidationError::EmptyText.into());
        }

        let form = DocumentForm::SystemPrompt { instructions };
        let outcome = self.service.save_form(&self.use_case.id, &form).await?;
        self.record(&outcome);
        self.machine.handle(&WorkflowEvent::Submitted);
        self.synchronize();
        Ok(outcome)
    }

    /// Remove the uploaded proof and send the user back to the branch entry.
    pub async fn delete_document(&mut self) -> Result<ActionOutcome, WorkflowError> {
        self.begin("delete_document")?;
        let span = self.span("delete_document");
        let result = self.run_delete_document().instrument(span).await;
        self.finish(result)
    }

    async fn run_delete_document(&mut self) -> Result<ActionOutcome, WorkflowError> {
        let doc_type = self.branch_document()?;
        let outcome = self.service.delete_file(&self.use_case.id, doc_type).await?;
        self.record(&outcome);
        if is_unacceptable_case(&self.use_case) {
            self.machine.handle(&WorkflowEvent::DocumentDeleted);
        }
        self.synchronize();
        Ok(outcome)
    }

    /// Back to confirm-date with every input cleared. Also releases a stuck
    /// busy flag left by a dropped action.
    pub fn reset(&mut self) {
        self.busy = None;
        self.generation += 1;
        self.machine.handle(&WorkflowEvent::Reset);
        self.synchronize();
    }

    fn branch_document(&self) -> Result<DocType, WorkflowError> {
        self.state()
            .branch()
            .map(DateBranch::required_document)
            .ok_or(WorkflowError::Validation(ValidationError::NoDeploymentDate))
    }

    fn record(&mut self, outcome: &ActionOutcome) {
        self.documents
            .insert(outcome.doc_type, outcome.document.clone());
        self.generation += 1;
        if let Some(change) = &outcome.score_change {
            info!(
                points_gained = change.points_gained,
                new_score = change.new_score,
                reason = change.reason.as_deref().unwrap_or_default(),
                "Compliance score changed"
            );
        }
    }

    fn synchronize(&mut self) {
        let snapshot = self.snapshot();
        self.machine
            .handle(&WorkflowEvent::Synchronized(snapshot));
    }

    fn span(&self, operation: &str) -> tracing::Span {
        create_workflow_span(
            operation,
            Some(&self.use_case.id),
            Some(&generate_correlation_id()),
        )
    }

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        match &self.busy {
            Some(timer) => Err(WorkflowError::ActionInProgress(timer.action())),
            None => Ok(()),
        }
    }

    /// Inputs typed into a step that does not show them are refused inline.
    fn ensure_step(&mut self, accepted: &[WorkflowStep]) -> Result<(), WorkflowError> {
        let step = self.step();
        if accepted.contains(&step) {
            Ok(())
        } else {
            Err(self.fail(WorkflowError::NotAvailable(step)))
        }
    }

    fn begin(&mut self, action: &'static str) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        self.busy = Some(ActionTimer::start(action));
        Ok(())
    }

    fn finish<T>(&mut self, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
        if let Some(timer) = self.busy.take() {
            timer.finish(&result);
        }
        result.map_err(|err| self.fail(err))
    }

    /// Surface a failure inline. The step stays where it is.
    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        warn!(
            usecase.id = %self.use_case.id,
            step = %self.step(),
            error = %err,
            "Workflow action failed"
        );
        self.machine
            .handle(&WorkflowEvent::Failed(err.user_message()));
        err
    }
}

async fn fetch_documents<A: DossierApi + ?Sized>(
    api: &A,
    usecase_id: &str,
) -> Result<Documents, ApiError> {
    let (stopping_proof, system_prompt) = tokio::try_join!(
        api.fetch_document(usecase_id, DocType::StoppingProof),
        api.fetch_document(usecase_id, DocType::SystemPrompt)
    )?;

    let mut documents = Documents::new();
    if let Some(document) = stopping_proof {
        documents.insert(DocType::StoppingProof, document);
    }
    if let Some(document) = system_prompt {
        documents.insert(DocType::SystemPrompt, document);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DocumentStatus, MockDossierApi, WriteReceipt};
    use crate::dossier::StorageQuota;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn use_case(date: Option<&str>) -> UseCase {
        UseCase {
            id: "uc-1".to_string(),
            name: "Reconnaissance des émotions".to_string(),
            company_id: Some("c-1".to_string()),
            risk_level: Some("unacceptable".to_string()),
            deployment_date: date.map(str::to_string),
            score_final: Some(40.0),
            status: None,
        }
    }

    fn done(file_url: Option<&str>) -> Document {
        Document {
            form_data: None,
            file_url: file_url.map(str::to_string),
            status: DocumentStatus::Complete,
            updated_at: None,
        }
    }

    /// Mock backed by an in-memory document store so refetches see writes.
    fn backend(use_case: UseCase, documents: Documents) -> (MockDossierApi, Arc<Mutex<Documents>>) {
        let store = Arc::new(Mutex::new(documents));
        let mut api = MockDossierApi::new();

        api.expect_fetch_use_case()
            .returning(move |_| Ok(use_case.clone()));

        let reader = Arc::clone(&store);
        api.expect_fetch_document()
            .returning(move |_, doc_type| Ok(reader.lock().unwrap().get(&doc_type).cloned()));

        let writer = Arc::clone(&store);
        api.expect_save_document()
            .returning(move |_, doc_type, form, status| {
                writer.lock().unwrap().insert(
                    doc_type,
                    Document {
                        form_data: Some(form.clone()),
                        file_url: None,
                        status,
                        updated_at: None,
                    },
                );
                Ok(WriteReceipt {
                    ok: true,
                    ..Default::default()
                })
            });

        let remover = Arc::clone(&store);
        api.expect_delete_upload().returning(move |_, doc_type| {
            remover.lock().unwrap().remove(&doc_type);
            Ok(())
        });

        api.expect_invalidate_usecase().returning(|_| ());

        (api, store)
    }

    async fn load(mut api: MockDossierApi) -> UnacceptableCaseWorkflow<MockDossierApi> {
        api.expect_fetch_next_steps().returning(|_| Ok(None));
        UnacceptableCaseWorkflow::load_at(DossierService::new(api, StorageQuota::default()), "uc-1", today())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn past_date_without_proof_starts_at_confirmation() {
        let (api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        let mut workflow = load(api).await;
        assert_eq!(workflow.step(), WorkflowStep::ConfirmDate);

        workflow.confirm_date().unwrap();
        assert_eq!(workflow.step(), WorkflowStep::UploadProof);
        assert!(!workflow.state().proof_uploaded());
        assert_eq!(workflow.required_document(), Some(DocType::StoppingProof));
    }

    #[tokio::test]
    async fn existing_stopping_proof_opens_on_upload_step() {
        let mut documents = Documents::new();
        documents.insert(DocType::StoppingProof, done(Some("dossiers/uc-1/proof.pdf")));
        let (api, _) = backend(use_case(Some("2020-01-01")), documents);

        let workflow = load(api).await;
        assert_eq!(workflow.step(), WorkflowStep::UploadProof);
        assert!(workflow.state().proof_uploaded());
    }

    #[tokio::test]
    async fn saving_text_marks_future_proof_uploaded() {
        let (api, store) = backend(use_case(Some("2099-01-01")), Documents::new());
        let mut workflow = load(api).await;
        assert!(!workflow.state().proof_uploaded());

        workflow.confirm_date().unwrap();
        workflow.set_text("Tu ne dois jamais évaluer les émotions").unwrap();
        let outcome = workflow.save_text().await.unwrap();

        assert!(outcome.refreshed);
        assert_eq!(outcome.document.status, DocumentStatus::Complete);
        assert!(workflow.state().proof_uploaded());
        assert_eq!(workflow.step(), WorkflowStep::FutureDeploymentWarning);
        assert_eq!(workflow.state().text_content(), "");
        assert!(store.lock().unwrap().contains_key(&DocType::SystemPrompt));
    }

    #[tokio::test]
    async fn deleting_proof_returns_to_branch_entry() {
        let mut documents = Documents::new();
        documents.insert(DocType::StoppingProof, done(Some("dossiers/uc-1/proof.pdf")));
        let (api, _) = backend(use_case(Some("2020-01-01")), documents);
        let mut workflow = load(api).await;

        workflow.delete_document().await.unwrap();
        assert_eq!(workflow.step(), WorkflowStep::UploadProof);
        assert!(!workflow.state().proof_uploaded());
        assert!(workflow.document(DocType::StoppingProof).is_some_and(|d| !d.has_file()));
    }

    #[tokio::test]
    async fn stale_refresh_is_discarded() {
        let mut documents = Documents::new();
        documents.insert(DocType::StoppingProof, done(Some("dossiers/uc-1/proof.pdf")));
        let (api, _) = backend(use_case(Some("2020-01-01")), documents.clone());
        let mut workflow = load(api).await;

        let ticket = workflow.begin_refresh();
        workflow.delete_document().await.unwrap();

        let applied = workflow.apply_refresh(ticket, use_case(Some("2020-01-01")), documents);
        assert!(!applied);
        assert!(!workflow.state().proof_uploaded());

        assert!(workflow.refresh().await.unwrap());
        assert!(!workflow.state().proof_uploaded());
    }

    #[tokio::test]
    async fn handlers_refuse_reentry_while_busy() {
        let (api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        let mut workflow = load(api).await;
        workflow.busy = Some(ActionTimer::start("upload_proof"));

        assert!(matches!(
            workflow.confirm_date(),
            Err(WorkflowError::ActionInProgress("upload_proof"))
        ));
        assert!(matches!(
            workflow.save_text().await,
            Err(WorkflowError::ActionInProgress(_))
        ));

        workflow.reset();
        assert!(!workflow.is_busy());
        assert!(workflow.confirm_date().is_ok());
    }

    #[tokio::test]
    async fn failed_upload_keeps_step_and_shows_error() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_storage_usage().returning(|| {
            Err(ApiError::Http {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "indisponible".to_string(),
            })
        });
        api.expect_upload_document().returning(|_, _, _| {
            Err(ApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Erreur lors de l'upload".to_string(),
            })
        });
        let mut workflow = load(api).await;
        workflow.confirm_date().unwrap();
        workflow
            .select_file(UploadFile::new("arret.pdf", b"%PDF".to_vec()))
            .unwrap();

        let err = workflow.upload_proof().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Api(_)));
        assert_eq!(workflow.step(), WorkflowStep::UploadProof);
        assert!(workflow.state().error().is_some());
        assert!(!workflow.is_busy());
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected_locally() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_upload_document().never();
        let mut workflow = load(api).await;
        workflow.confirm_date().unwrap();

        let err = workflow.upload_proof().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::MissingFile)
        ));
    }

    #[tokio::test]
    async fn saving_a_new_date_switches_branch() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_update_deployment_date()
            .withf(|id, date| id == "uc-1" && date == "2099-03-01")
            .times(1)
            .returning(|_, date| Ok(use_case(Some(date))));
        let mut workflow = load(api).await;

        workflow.modify_date().unwrap();
        assert_eq!(workflow.state().new_date(), "2020-01-01");
        workflow.set_draft_date("2099-03-01").unwrap();
        workflow.save_date().await.unwrap();

        assert_eq!(workflow.step(), WorkflowStep::ConfirmDate);
        assert_eq!(workflow.state().branch(), Some(DateBranch::Future));
        assert_eq!(workflow.required_document(), Some(DocType::SystemPrompt));
    }

    #[tokio::test]
    async fn empty_draft_date_is_rejected() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_update_deployment_date().never();
        let mut workflow = load(api).await;

        workflow.modify_date().unwrap();
        workflow.set_draft_date("  ").unwrap();
        let err = workflow.save_date().await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::MissingDate)
        ));
        assert_eq!(workflow.step(), WorkflowStep::EditDate);
    }

    #[tokio::test]
    async fn other_risk_levels_are_refused() {
        let mut limited = use_case(Some("2020-01-01"));
        limited.risk_level = Some("limited".to_string());
        let (api, _) = backend(limited, Documents::new());

        let result =
            UnacceptableCaseWorkflow::load_at(DossierService::new(api, StorageQuota::default()), "uc-1", today())
                .await;
        assert!(matches!(result, Err(WorkflowError::NotUnacceptable { .. })));
    }

    #[tokio::test]
    async fn next_steps_are_loaded_with_the_workflow() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_fetch_next_steps()
            .withf(|id| id == "uc-1")
            .times(1)
            .returning(|_| {
                Ok(Some(UseCaseNextSteps {
                    evaluation: Some("Pratique interdite par l'article 5".to_string()),
                    ..Default::default()
                }))
            });

        let workflow =
            UnacceptableCaseWorkflow::load_at(DossierService::new(api, StorageQuota::default()), "uc-1", today())
                .await
                .unwrap();
        assert_eq!(
            workflow.next_steps().and_then(|steps| steps.evaluation.as_deref()),
            Some("Pratique interdite par l'article 5")
        );
        assert!(workflow.next_steps_error().is_none());
    }

    #[tokio::test]
    async fn unavailable_next_steps_do_not_block_loading() {
        let (mut api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        api.expect_fetch_next_steps().times(1).returning(|_| {
            Err(ApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Erreur lors du chargement des recommandations".to_string(),
            })
        });

        let workflow =
            UnacceptableCaseWorkflow::load_at(DossierService::new(api, StorageQuota::default()), "uc-1", today())
                .await
                .unwrap();
        assert!(workflow.next_steps().is_none());
        assert_eq!(
            workflow.next_steps_error(),
            Some("Erreur lors du chargement des recommandations")
        );
        assert_eq!(workflow.step(), WorkflowStep::ConfirmDate);
        assert!(workflow.state().error().is_none());
    }

    #[tokio::test]
    async fn edit_existing_prefills_saved_instructions() {
        let shapes = [
            json!({ "system_instructions": "Ne jamais inférer les émotions" }),
            Value::String("{\"system_instructions\":\"Ne jamais inférer les émotions\"}".to_string()),
        ];
        for form_data in shapes {
            let mut documents = Documents::new();
            documents.insert(
                DocType::SystemPrompt,
                Document {
                    form_data: Some(form_data),
                    ..done(None)
                },
            );
            let (api, _) = backend(use_case(Some("2099-01-01")), documents);
            let mut workflow = load(api).await;
            assert_eq!(workflow.step(), WorkflowStep::FutureDeploymentWarning);

            workflow.edit_existing().unwrap();
            assert_eq!(workflow.state().text_content(), "Ne jamais inférer les émotions");
            assert!(workflow.state().is_editing_existing());
        }
    }

    #[tokio::test]
    async fn inputs_outside_their_step_are_refused() {
        let (api, _) = backend(use_case(Some("2020-01-01")), Documents::new());
        let mut workflow = load(api).await;

        assert!(matches!(
            workflow.select_file(UploadFile::new("arret.pdf", b"%PDF".to_vec())),
            Err(WorkflowError::NotAvailable(WorkflowStep::ConfirmDate))
        ));
        assert!(workflow.state().selected_file().is_none());
        assert!(workflow.state().error().is_some());

        workflow.confirm_date().unwrap();
        assert!(matches!(
            workflow.set_text("Instructions"),
            Err(WorkflowError::NotAvailable(WorkflowStep::UploadProof))
        ));
        assert!(matches!(
            workflow.edit_existing(),
            Err(WorkflowError::NotAvailable(WorkflowStep::UploadProof))
        ));
        assert_eq!(workflow.state().text_content(), "");
        assert!(workflow
            .select_file(UploadFile::new("arret.pdf", b"%PDF".to_vec()))
            .is_ok());
    }
}
