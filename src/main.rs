use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use dossier_workflow::api::{DossierApi, DossierClient};
use dossier_workflow::dossier::{DocType, DossierService, StorageQuota, UploadFile};
use dossier_workflow::todo::{completion_ratio, todos_for, COMPLIANCE_DOCUMENT_TYPES};
use dossier_workflow::workflow::{
    format_date_for_input, Documents, UnacceptableCaseWorkflow, WorkflowError, WorkflowStep,
};
use dossier_workflow::{init_telemetry, ActionOutcome, ActionTimer, ApiError};

#[derive(Parser)]
#[command(name = "dossier")]
#[command(about = "AI Act compliance dossiers: unacceptable-case workflow and to-do lists")]
#[command(long_about = "Drives the compliance workflow of use cases classified at unacceptable risk: \
                       confirm or correct the deployment date, then provide the stopping proof \
                       (past deployment) or the system instructions (future deployment).")]
struct Cli {
    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,
    /// Override the API base URL from the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the access token from the configuration
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the workflow step, date branch and proof state of a use case
    Status { usecase: String },
    /// Confirm the stored deployment date
    Confirm { usecase: String },
    /// Correct the deployment date (YYYY-MM-DD)
    SetDate { usecase: String, date: String },
    /// Upload the proof file the deployment date requires
    Upload { usecase: String, path: PathBuf },
    /// Save the system instructions of a future deployment
    SaveText {
        usecase: String,
        /// Instructions text
        #[arg(required_unless_present = "file")]
        text: Option<String>,
        /// Read the instructions from a text file instead
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Delete the uploaded proof and go back to the branch entry
    Delete { usecase: String },
    /// List the compliance to-dos of one or more use cases
    Todos {
        company: String,
        #[arg(required = true)]
        usecases: Vec<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::Confirm { .. } => "confirm",
            Commands::SetDate { .. } => "set_date",
            Commands::Upload { .. } => "upload",
            Commands::SaveText { .. } => "save_text",
            Commands::Delete { .. } => "delete",
            Commands::Todos { .. } => "todos",
        }
    }
}

type Service = DossierService<DossierClient>;

fn main() {
    let cli = Cli::parse();

    let result = tokio::runtime::Runtime::new()
        .context("Failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        report_error(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = dossier_workflow::config()?.clone();
    if let Some(base_url) = cli.base_url {
        settings.api.base_url = base_url;
    }
    if let Some(token) = cli.token {
        settings.api.token = Some(token);
    }
    init_telemetry(
        &settings.observability.log_level,
        cli.json_logs || settings.observability.json_logs,
    )?;

    let client = DossierClient::from_config(&settings.api)?;
    let service = DossierService::new(
        client.clone(),
        StorageQuota::new(settings.storage.max_storage_mb),
    )
    .with_metrics(Arc::clone(client.metrics()));

    let timer = ActionTimer::start(cli.command.name());
    let result = match cli.command {
        Commands::Status { usecase } => status_command(service, &usecase).await,
        Commands::Confirm { usecase } => confirm_command(service, &usecase).await,
        Commands::SetDate { usecase, date } => set_date_command(service, &usecase, &date).await,
        Commands::Upload { usecase, path } => upload_command(service, &usecase, path).await,
        Commands::SaveText {
            usecase,
            text,
            file,
        } => save_text_command(service, &usecase, text, file).await,
        Commands::Delete { usecase } => delete_command(service, &usecase).await,
        Commands::Todos { company, usecases } => todos_command(service, &company, &usecases).await,
    };
    timer.finish(&result);
    client.metrics().log_summary();
    result
}

async fn status_command(service: Service, usecase: &str) -> Result<()> {
    let workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    print_workflow(&workflow);
    Ok(())
}

async fn confirm_command(service: Service, usecase: &str) -> Result<()> {
    let mut workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    workflow.confirm_date()?;
    println!("✅ Date de déploiement confirmée");
    println!();
    print_workflow(&workflow);
    Ok(())
}

async fn set_date_command(service: Service, usecase: &str, date: &str) -> Result<()> {
    let mut workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    workflow.modify_date()?;
    workflow.set_draft_date(date)?;
    workflow.save_date().await?;
    println!("✅ Date de déploiement mise à jour : {date}");
    println!();
    print_workflow(&workflow);
    Ok(())
}

async fn upload_command(service: Service, usecase: &str, path: PathBuf) -> Result<()> {
    let file = UploadFile::from_path(&path)
        .await
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    let mut workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    enter_branch_step(&mut workflow)?;
    workflow.select_file(file)?;

    let outcome = workflow.upload_proof().await?;
    println!("✅ {} envoyé", outcome.doc_type.label());
    print_outcome(&outcome);
    println!();
    print_workflow(&workflow);
    Ok(())
}

async fn save_text_command(
    service: Service,
    usecase: &str,
    text: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let text = match (text, file) {
        (_, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Impossible de lire {}", path.display()))?,
        (Some(text), None) => text,
        (None, None) => anyhow::bail!("Veuillez fournir un texte ou --file"),
    };

    let mut workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    enter_branch_step(&mut workflow)?;
    workflow.set_text(text)?;

    let outcome = workflow.save_text().await?;
    println!("✅ Instructions système enregistrées ({})", outcome.document.status);
    print_outcome(&outcome);
    println!();
    print_workflow(&workflow);
    Ok(())
}

async fn delete_command(service: Service, usecase: &str) -> Result<()> {
    let mut workflow = UnacceptableCaseWorkflow::load(service, usecase).await?;
    let outcome = workflow.delete_document().await?;
    println!("🗑️  {} supprimé", outcome.doc_type.label());
    println!();
    print_workflow(&workflow);
    Ok(())
}

async fn todos_command(service: Service, company_id: &str, usecases: &[String]) -> Result<()> {
    let company = match service.api().fetch_company(company_id).await {
        Ok(company) => Some(company),
        Err(err) => {
            tracing::warn!(company_id, error = %err, "Company unavailable, registry status unknown");
            None
        }
    };
    let today = chrono::Local::now().date_naive();

    for usecase_id in usecases {
        let use_case = service.api().fetch_use_case(usecase_id).await?;

        let mut documents = Documents::new();
        let tracked = COMPLIANCE_DOCUMENT_TYPES
            .iter()
            .copied()
            .chain([DocType::StoppingProof, DocType::RegistryProof]);
        for doc_type in tracked {
            if let Some(document) = service.load_document(usecase_id, doc_type).await? {
                documents.insert(doc_type, document);
            }
        }

        let items = todos_for(&use_case, company.as_ref(), &documents, today);
        println!(
            "📋 {} ({}% complété)",
            use_case.display_name(),
            completion_ratio(&items)
        );
        println!("────────────────────");
        if items.is_empty() {
            println!(" ℹ️  Aucune action requise");
        }
        for item in &items {
            let mark = if item.completed { "✅" } else { "⬜" };
            if item.points > 0 {
                println!(" {mark} {} (+{} pts)", item.text, item.points);
            } else {
                println!(" {mark} {}", item.text);
            }
        }
        println!();
    }
    Ok(())
}

/// Upload and text commands act from the branch step; confirm the date first if needed.
fn enter_branch_step<A: DossierApi>(workflow: &mut UnacceptableCaseWorkflow<A>) -> Result<()> {
    match workflow.step() {
        WorkflowStep::ConfirmDate => workflow.confirm_date()?,
        WorkflowStep::EditDate => {
            workflow.cancel_edit()?;
            workflow.confirm_date()?;
        }
        WorkflowStep::UploadProof | WorkflowStep::FutureDeploymentWarning => {}
    }
    Ok(())
}

fn print_workflow<A: DossierApi>(workflow: &UnacceptableCaseWorkflow<A>) {
    let use_case = workflow.use_case();
    let state = workflow.state();
    let date = format_date_for_input(use_case.deployment_date.as_deref());

    println!("🚫 {} (risque inacceptable)", use_case.display_name());
    println!("==========================");
    if date.is_empty() {
        println!(" 📅 Date de déploiement : non définie");
    } else {
        println!(" 📅 Date de déploiement : {date}");
    }
    println!(" 🔄 Étape : {}", workflow.step());

    match workflow.required_document() {
        Some(doc_type) => {
            let mark = if state.proof_uploaded() { "✅" } else { "❌" };
            println!(" {mark} {}", doc_type.label());
            if let Some(url) = workflow.document(doc_type).and_then(|doc| doc.file_url.as_deref()) {
                println!("    📎 {url}");
            }
        }
        None => println!(" ⚠️  Aucun document requis tant que la date n'est pas définie"),
    }

    if let Some(error) = state.error() {
        println!(" ❌ {error}");
    }

    print_next_steps(workflow);
}

fn print_next_steps<A: DossierApi>(workflow: &UnacceptableCaseWorkflow<A>) {
    if workflow.next_steps_error().is_some() {
        println!();
        println!(" ⚠️  Recommandations indisponibles pour le moment");
        return;
    }
    let Some(next_steps) = workflow.next_steps() else {
        return;
    };
    let sections = next_steps.sections();
    if sections.is_empty() {
        return;
    }
    println!();
    println!("💡 Recommandations");
    println!("──────────────────");
    for (heading, text) in sections {
        println!(" {heading} : {text}");
    }
}

fn print_outcome(outcome: &ActionOutcome) {
    if !outcome.refreshed {
        println!(" ⚠️  Document non relu, état reconstruit depuis la réponse d'enregistrement");
    }
    if let Some(change) = &outcome.score_change {
        println!(
            " 📈 Score : {:.0} → {:.0} (+{:.0} pts)",
            change.previous_score, change.new_score, change.points_gained
        );
    }
}

fn report_error(err: &anyhow::Error) {
    let (message, hint) = match err.downcast_ref::<WorkflowError>() {
        Some(WorkflowError::Api(api)) => (api.to_string(), api.hint()),
        Some(workflow) => (workflow.user_message(), None),
        None => match err.downcast_ref::<ApiError>() {
            Some(api) => (api.to_string(), api.hint()),
            None => (format!("{err:#}"), None),
        },
    };
    eprintln!("❌ {message}");
    if let Some(hint) = hint {
        eprintln!("   {hint}");
    }
}
