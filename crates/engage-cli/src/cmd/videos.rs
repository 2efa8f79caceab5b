use crate::bridge::CommandBridge;
use crate::output::{clip, print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use engage_core::config::Config;
use engage_core::orchestrator::EngagementSurface;
use std::path::Path;

/// List the channel's videos and show the ones the scenario's discovery
/// method would select, without visiting any of them.
pub fn run(
    home: &Path,
    scenario: Option<&str>,
    profile: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(home).context("failed to load config")?;
    let (_, profile) = config.profile(profile)?;
    let (_, scenario) = config.scenario(scenario)?;
    let bridge = CommandBridge::new(config.bridge.clone(), profile.channel.clone());

    let rt = tokio::runtime::Runtime::new()?;
    let listed = rt.block_on(
        bridge.list_videos(&profile.channel, scenario.discovery.listing_limit()),
    )?;
    let selected = scenario.discovery.select(listed, Utc::now());

    if json {
        return print_json(&selected);
    }
    if selected.is_empty() {
        println!("No videos selected.");
        return Ok(());
    }
    let rows = selected
        .iter()
        .map(|v| {
            vec![
                clip(&v.title, 50),
                v.posted.clone().unwrap_or_else(|| "-".into()),
                v.url.clone(),
            ]
        })
        .collect();
    print_table(&["TITLE", "POSTED", "URL"], rows);
    Ok(())
}
