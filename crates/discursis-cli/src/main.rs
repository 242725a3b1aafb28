//! Discursis CLI - a command line front end for the Discursis text analytics
//! service.
//!
//! Logs in against the backend, keeps the session in a cookie between runs,
//! and fetches projects and their analysis data.

mod app;
mod utils;

use std::io;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use discursis_core::models::{ExportKind, ModelQuery};

use app::{user_message, App};

#[derive(Parser)]
#[command(name = "discursis", version, about = "Discursis text analytics client")]
struct Cli {
    /// Backend URL, e.g. http://localhost:5000
    #[arg(long, global = true, env = "DISCURSIS_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and keep the session until logout
    Login {
        #[arg(long, env = "DISCURSIS_EMAIL")]
        email: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(long, env = "DISCURSIS_EMAIL")]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Status,
    /// Password reset flow
    #[command(subcommand)]
    ResetPassword(ResetCommand),
    /// List, show or delete projects
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Recurrence model for a project
    Model {
        #[command(flatten)]
        model: ModelArgs,
        /// Print the full model as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clustering for a project
    Cluster {
        #[arg(long)]
        project: Option<i64>,
        #[arg(long = "type", default_value = "term")]
        cluster_type: String,
    },
    /// Similar-term clusters for a project
    SimilarTerms {
        #[arg(long)]
        project: Option<i64>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// 2D term layout for a project
    Layout {
        #[arg(long)]
        project: Option<i64>,
    },
    /// Print the download URL of a CSV export
    Export {
        #[arg(value_enum)]
        kind: ExportArg,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Print the upload form target
    UploadUrl,
}

#[derive(Subcommand)]
enum ResetCommand {
    /// Email a reset link
    Request {
        #[arg(long, env = "DISCURSIS_EMAIL")]
        email: Option<String>,
    },
    /// Check a reset token from the emailed link
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
    },
    /// Set a new password with a reset token
    Finish {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
    },
}

#[derive(Subcommand)]
enum ProjectsCommand {
    List,
    /// Show one project, or the current default project
    Show { id: Option<i64> },
    Delete { id: i64 },
}

#[derive(Args)]
struct ModelArgs {
    /// Project id; the server's default project when omitted
    #[arg(long)]
    project: Option<i64>,
    /// Model type: term, term-expansion, composition
    #[arg(long, default_value = "term")]
    model: String,
    /// Limit to the most frequent terms
    #[arg(long)]
    num_terms: Option<u32>,
}

impl ModelArgs {
    fn query(&self) -> ModelQuery {
        ModelQuery::new(self.model.clone()).with_num_terms(self.num_terms)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportArg {
    ChannelSimilarity,
    Primitives,
}

impl From<ExportArg> for ExportKind {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::ChannelSimilarity => ExportKind::ChannelSimilarity,
            ExportArg::Primitives => ExportKind::Primitives,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing();
    info!("Discursis CLI starting");

    let mut app = match App::new(cli.api_url) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&mut app, cli.command).await;
    app.handle_session_events();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", user_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(app: &mut App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email } => app.login(email).await,
        Command::Register { email } => app.register(email).await,
        Command::Logout => {
            app.logout();
            Ok(())
        }
        Command::Status => {
            app.status();
            Ok(())
        }
        Command::ResetPassword(reset) => match reset {
            ResetCommand::Request { email } => app.request_password_reset(email).await,
            ResetCommand::Verify { email, token } => app.verify_reset_token(&email, &token).await,
            ResetCommand::Finish { email, token } => {
                app.finish_password_reset(&email, &token).await
            }
        },
        Command::Projects(projects) => match projects {
            ProjectsCommand::List => app.list_projects().await,
            ProjectsCommand::Show { id } => app.show_project(id).await,
            ProjectsCommand::Delete { id } => app.delete_project(id).await,
        },
        Command::Model { model, json } => app.show_model(model.project, &model.query(), json).await,
        Command::Cluster {
            project,
            cluster_type,
        } => app.show_cluster(project, &cluster_type).await,
        Command::SimilarTerms { project, threshold } => {
            app.show_similar_terms(project, threshold).await
        }
        Command::Layout { project } => app.show_term_layout(project).await,
        Command::Export { kind, model } => app.export(model.project, kind.into(), &model.query()).await,
        Command::UploadUrl => app.upload_url(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "discursis",
            "export",
            "channel-similarity",
            "--project",
            "7",
            "--model",
            "composition",
            "--num-terms",
            "50",
        ])
        .unwrap();
        match cli.command {
            Command::Export { kind, model } => {
                assert!(matches!(ExportKind::from(kind), ExportKind::ChannelSimilarity));
                assert_eq!(model.project, Some(7));
                assert_eq!(model.query(), ModelQuery::new("composition").with_num_terms(Some(50)));
            }
            _ => panic!("expected export command"),
        }
    }
}
