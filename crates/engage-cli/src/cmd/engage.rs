use crate::bridge::CommandBridge;
use crate::output::{clip, print_json, print_pairs, print_table};
use anyhow::Context;
use engage_core::config::Config;
use engage_core::ledger::Ledger;
use engage_core::orchestrator::{ItemOutcome, Orchestrator, RunReport};
use engage_core::paths;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub fn run(
    home: &Path,
    scenario: Option<&str>,
    profile: Option<&str>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(home).context("failed to load config")?;
    let (profile_name, profile) = config.profile(profile)?;
    let (scenario_name, scenario) = config.scenario(scenario)?;

    let settings = config.engage_settings(scenario, dry_run)?;
    let governor = config.pacing_governor()?;
    let ledger = Ledger::open(&paths::ledger_path(home)).context("failed to open ledger")?;
    let bridge = CommandBridge::new(config.bridge.clone(), profile.channel.clone());

    let orchestrator = Orchestrator::new(
        Arc::new(bridge),
        Arc::new(ledger),
        Arc::new(governor),
        settings,
    );

    if !json {
        let mode = if orchestrator.settings().dry_run { " (dry run)" } else { "" };
        println!(
            "Running scenario '{scenario_name}' on profile '{profile_name}' ({}){mode}",
            profile.channel
        );
    }

    let rt = tokio::runtime::Runtime::new()?;
    let channel = profile.channel.clone();
    let discovery = scenario.discovery.clone();

    let report = rt.block_on(async {
        let token = orchestrator.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping");
                token.cancel();
            }
        });
        let result = orchestrator.run_channel(&channel, &discovery).await;
        interrupt.abort();
        result
    })?;

    if json {
        let value = serde_json::json!({
            "scenario": scenario_name,
            "profile": profile_name,
            "summary": report.summary(),
            "report": report,
        });
        return print_json(&value);
    }
    print_report(&report);
    Ok(())
}

fn outcome_label(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::FilteredOut { reason } => format!("filtered: {reason}"),
        ItemOutcome::SkippedDuplicate => "already done".to_string(),
        ItemOutcome::WouldAct => "would act".to_string(),
        ItemOutcome::ActedSuccess => "done".to_string(),
        ItemOutcome::ActedFailed { attempts, reason } => {
            format!("failed after {attempts}: {}", clip(reason, 40))
        }
    }
}

fn print_report(report: &RunReport) {
    let rows: Vec<Vec<String>> = report
        .videos
        .iter()
        .flat_map(|v| {
            v.events.iter().map(move |e| {
                vec![
                    clip(&v.video, 40),
                    e.item_id.clone(),
                    clip(&e.author, 20),
                    e.action.map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                    outcome_label(&e.outcome),
                ]
            })
        })
        .collect();

    if rows.is_empty() {
        println!("No comments found.");
    } else {
        print_table(&["VIDEO", "COMMENT", "AUTHOR", "ACTION", "OUTCOME"], rows);
    }

    for video in report.videos.iter().filter(|v| v.error.is_some()) {
        println!(
            "[warning] {}: {}",
            video.video,
            video.error.as_deref().unwrap_or_default()
        );
    }

    let s = report.summary();
    println!();
    let acted_label = if report.dry_run { "would act" } else { "succeeded" };
    let acted = if report.dry_run { s.would_act } else { s.succeeded };
    print_pairs(&[
        ("videos", s.videos.to_string()),
        ("discovered", s.discovered.to_string()),
        ("unreadable", s.unreadable.to_string()),
        ("filtered", s.filtered.to_string()),
        ("already done", s.duplicates.to_string()),
        (acted_label, acted.to_string()),
        ("failed", s.failed.to_string()),
        ("video errors", s.video_errors.to_string()),
    ]);
}
