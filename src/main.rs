use match_review::config::Settings;
use match_review::core::{ReviewSession, WorkflowState};
use match_review::services::RemoteMatchingClient;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

/// Pick the matching key: configured columns win, else the recommendation
fn choose_columns(state: &WorkflowState, configured: &[String]) -> Vec<String> {
    if configured.is_empty() {
        state.recommended_columns.clone()
    } else {
        configured.to_vec()
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn Error>> {
    let Some(file) = settings.session.file.clone() else {
        return Err("no spreadsheet configured (set session.file or MATCH_REVIEW__SESSION__FILE)".into());
    };

    let client = Arc::new(RemoteMatchingClient::new(
        settings.service.base_url.clone(),
        settings.service.timeout(),
    )?);
    info!("Matching service at {}", client.base_url());

    let mut session = ReviewSession::new(client, settings.session_options());

    let columns = session.upload(&file, &settings.session.table_name).await?;
    info!("Columns: {:?}", columns);

    if settings.session.columns.is_empty() {
        session.recommend().await?;
    }
    for column in choose_columns(session.workflow(), &settings.session.columns) {
        session.toggle_column(&column, true);
    }

    let preview = session.combine().await?;
    for sample in &preview {
        info!("Combined key sample: {}", sample);
    }

    let summary = session.run_match().await?;
    info!(
        "Match finished ({}/{}): {} ambiguous, {} confident",
        summary.progress.current, summary.progress.total, summary.ambiguous, summary.confident
    );

    let page = session.page(1).await?;
    info!("Page {} of {} ({} candidates queued)", page.number, page.total_pages, page.total_entries);
    for row in &page.rows {
        info!(
            "#{} {} <> {} (score {:.4}, fuzzy {:.1})",
            row.global_index + 1,
            row.entry.candidate.combined_key_a,
            row.entry.candidate.combined_key_b,
            row.entry.candidate.similarity_score,
            row.entry.candidate.fuzzy_score
        );
    }

    let workbook_path = settings.export.directory.join(&settings.export.workbook_filename);
    let rows = session.export_queue(&workbook_path).await?;
    info!("Review queue ({} rows) written to {}", rows, workbook_path.display());

    let export_path = session.export_remote(&settings.export.directory).await?;
    info!("Service export saved to {}", export_path.display());

    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return std::process::ExitCode::FAILURE;
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);
    info!("Starting match review session...");

    match run(settings).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("Session failed: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
