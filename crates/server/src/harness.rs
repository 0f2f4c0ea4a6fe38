//! Terminal front end for pipeline runs, web search and session listing.

use ghostwriter_core::config::{Credentials, GhostwriterConfig};
use ghostwriter_core::pipeline::{
    Ghostwriter, PipelineEvent, PipelineEventKind, PipelineResult, RunScope,
};
use ghostwriter_core::session::SessionManager;
use ghostwriter_core::tools::search::SearchResponse;
use ghostwriter_core::tools::{format_results_markdown, TavilySearch, WebSearch};
use tokio::sync::mpsc;

/// Run the pipeline with live progress on stdout
pub async fn run_pipeline(
    config: GhostwriterConfig,
    topic: &str,
    style_guide: &str,
    scope: RunScope,
) -> anyhow::Result<()> {
    println!("{}", "=".repeat(80));
    println!("Ghostwriter: {}", topic);
    println!("{}", "=".repeat(80));

    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(64);
    let ghostwriter = Ghostwriter::from_env(config)?.with_event_channel(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = progress_line(&event) {
                println!("{}", line);
            }
        }
    });

    let outcome = ghostwriter.run_scope(topic, style_guide, scope).await;
    drop(ghostwriter);
    let _ = printer.await;

    match outcome {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            eprintln!("\n❌ Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}

fn progress_line(event: &PipelineEvent) -> Option<String> {
    let stage = event.stage.map(|s| s.to_string()).unwrap_or_default();
    let data = event.data.as_ref();
    let field = |key: &str| {
        data.and_then(|d| d.get(key))
            .map(|v| v.to_string())
            .unwrap_or_default()
    };

    match event.kind {
        PipelineEventKind::StageStarted => Some(format!("\n▶ {}", stage)),
        PipelineEventKind::StageCompleted => Some(format!("✅ {} complete", stage)),
        PipelineEventKind::StageFailed => Some(format!("❌ {} failed: {}", stage, field("error"))),
        PipelineEventKind::ResearcherCompleted => Some(format!(
            "  researcher {} found {} sources",
            field("researcher_id"),
            field("sources")
        )),
        PipelineEventKind::ResearcherFailed => Some(format!(
            "  ⚠️ researcher {} failed: {}",
            field("researcher_id"),
            field("error")
        )),
        PipelineEventKind::ClaimVerified => Some(format!(
            "  claim {}: {}",
            field("claim_id"),
            field("verdict").trim_matches('"')
        )),
        PipelineEventKind::RevisionIteration => Some(format!(
            "\n🔁 Revision pass {}",
            field("iteration")
        )),
        _ => None,
    }
}

fn print_summary(result: &PipelineResult) {
    println!("\n{}", "=".repeat(80));
    println!("PIPELINE RESULTS");
    println!("{}", "=".repeat(80));
    println!("Session ID: {}", result.session_id);
    println!("Session dir: {}", result.session_dir.display());
    println!("Topic: {}", result.topic);
    println!("Sources: {}", result.total_sources);
    if let Some(claims) = result.claims_extracted {
        println!("Claims extracted: {}", claims);
    }
    if let Some(rate) = result.verification_rate {
        println!("Verification Rate: {:.1}%", rate * 100.0);
        println!("Threshold met: {}", result.threshold_met);
        println!("Revision Iterations: {}", result.revision_iterations);
    }
    if let Some(path) = &result.final_report_path {
        println!("\n📄 View report at: {}", path.display());
    }
}

/// `ghostwriter search`, the program researchers shell out to
pub async fn search(query: &str, max_results: u32, json: bool) -> anyhow::Result<()> {
    let credentials = Credentials::from_env();
    let search = TavilySearch::new(credentials.tavily_api_key()?)?;
    let results = search.search(query, max_results).await?;

    if json {
        let response = SearchResponse {
            query: query.to_string(),
            results,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", format_results_markdown(query, &results));
    }
    Ok(())
}

pub async fn list_sessions(config: &GhostwriterConfig) -> anyhow::Result<()> {
    let manager = SessionManager::new(config.workspace_root.clone());
    let ids = manager.list_sessions().await?;
    if ids.is_empty() {
        println!("No sessions in {}", config.workspace_root.display());
        return Ok(());
    }

    for id in ids {
        let session = manager.load_session(&id).await?;
        match session.metadata().await {
            Ok(metadata) => println!(
                "{}  {:<11} {}",
                id,
                metadata.status.as_str(),
                metadata.topic
            ),
            Err(e) => println!("{}  (unreadable metadata: {})", id, e),
        }
    }
    Ok(())
}
