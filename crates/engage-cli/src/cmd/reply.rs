use crate::output::{print_json, print_table};
use anyhow::Context;
use engage_core::config::Config;
use llm_chain::{Attempt, ChainError, GenerationRequest};
use std::path::Path;

const SYSTEM_PROMPT: &str = "You reply to comments on a creator's YouTube videos, \
as the creator. Keep it to one or two friendly sentences. Reply with the text only.";

pub fn run(home: &Path, comment: &str, context: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(home).context("failed to load config")?;
    let chain = config.llm.build().context("invalid llm config")?;

    let mut request = GenerationRequest::new(prompt(comment, context)).with_system(SYSTEM_PROMPT);
    request.temperature = Some(0.7);

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(chain.generate(&request)) {
        Ok(result) => {
            if json {
                return print_json(&result);
            }
            println!("{}", result.text);
            println!();
            println!("via {} / {}", result.provider_used, result.model_used);
            print_trail(&result.attempts);
            Ok(())
        }
        Err(e @ ChainError::AllProvidersExhausted { .. }) => {
            if json {
                let value = serde_json::json!({
                    "error": e.to_string(),
                    "attempts": e.attempts(),
                });
                print_json(&value)?;
            } else {
                print_trail(e.attempts());
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn prompt(comment: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            format!("Context: {}\n\nComment: {}\n\nWrite a reply.", ctx.trim(), comment.trim())
        }
        _ => format!("Comment: {}\n\nWrite a reply.", comment.trim()),
    }
}

fn print_trail(attempts: &[Attempt]) {
    let rows = attempts
        .iter()
        .enumerate()
        .map(|(i, a)| {
            vec![
                (i + 1).to_string(),
                a.provider.clone(),
                a.model.clone(),
                a.error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "ok".into()),
            ]
        })
        .collect();
    print_table(&["#", "PROVIDER", "MODEL", "RESULT"], rows);
}
