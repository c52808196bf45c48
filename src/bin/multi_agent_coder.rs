//! `multi_agent_coder` binary: parses CLI flags, builds the orchestration
//! stack from a configuration file, fans a prompt out to every healthy
//! provider, merges the results, and reports a process exit code.

use std::collections::HashMap;
use std::io::Read;
use std::process::ExitCode;

use clap::Parser;
use multi_agent_coder::cli::{exit_code, record_history, save_session, App, Cli};
use multi_agent_coder::config::Configuration;
use multi_agent_coder::context::PromptContext;
use multi_agent_coder::merge::{FileVariant, MergeEngine, ResolutionStrategy};
use multi_agent_coder::cache::AnalysisCache;
use multi_agent_coder::learner::PatternLearner;
use multi_agent_coder::provider::ProviderId;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(exit_code::FATAL_INTERNAL as u8)
        }
    }
}

async fn run(cli: Cli) -> multi_agent_coder::error::Result<i32> {
    let prompt = match &cli.prompt {
        Some(p) => p.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| multi_agent_coder::error::PipelineError::Other(e.to_string()))?;
            buf.trim().to_string()
        }
    };

    if prompt.is_empty() {
        eprintln!("error: no prompt given (pass one as an argument or pipe it on stdin)");
        return Ok(exit_code::USER_ERROR);
    }

    let filter = match cli.provider_filter() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("error: {}", err);
            return Ok(exit_code::USER_ERROR);
        }
    };

    let config_text = match std::fs::read_to_string(&cli.config) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: couldn't read config '{}': {}", cli.config.display(), err);
            return Ok(exit_code::USER_ERROR);
        }
    };
    let config = match Configuration::from_json(&config_text) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("error: invalid config: {}", err);
            return Ok(exit_code::USER_ERROR);
        }
    };

    let context = match &cli.context {
        Some(path) => {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    eprintln!("error: couldn't read context '{}': {}", path.display(), err);
                    return Ok(exit_code::USER_ERROR);
                }
            };
            match PromptContext::from_json(&text) {
                Ok(c) => c,
                Err(err) => {
                    eprintln!("error: invalid context: {}", err);
                    return Ok(exit_code::USER_ERROR);
                }
            }
        }
        None => PromptContext::default(),
    };

    let app = App::build(&config, cli.timeout_ms);

    if let Err(err) = app.ensure_providers_healthy().await {
        eprintln!("error: {}", err);
        return Ok(exit_code::NO_PROVIDERS_HEALTHY);
    }

    record_history(&prompt);

    let task_id = uuid::Uuid::new_v4().to_string();
    let strategy = cli.strategy.into();
    let responses = app.run(&task_id, &prompt, strategy, filter.as_deref(), context).await;

    if responses.is_empty() {
        eprintln!("error: no provider returned a result");
        return Ok(exit_code::NO_PROVIDERS_HEALTHY);
    }

    let merged = merge_responses(&responses).await;

    if let Some(name) = &cli.session {
        let providers: Vec<ProviderId> = responses.keys().copied().collect();
        save_session(name, &prompt, providers, responses.clone());
    }

    let rendered = render(&responses, &merged);
    match &cli.output {
        Some(path) => std::fs::write(path, rendered)
            .map_err(|e| multi_agent_coder::error::PipelineError::Other(e.to_string()))?,
        None => println!("{}", rendered),
    }

    Ok(exit_code::SUCCESS)
}

/// Treat every provider's full answer as one file variant at a synthetic
/// `response.md` path and run it through the Merge Engine, so a CLI
/// invocation gets the same conflict-resolved text a library caller would.
async fn merge_responses(responses: &HashMap<ProviderId, String>) -> Option<String> {
    if responses.len() < 2 {
        return None;
    }
    let variants: Vec<FileVariant> = responses
        .iter()
        .map(|(provider, content)| FileVariant {
            provider: *provider,
            path: "response.md".to_string(),
            content: Some(content.clone()),
        })
        .collect();

    let mut by_path = HashMap::new();
    by_path.insert("response.md".to_string(), variants);

    let engine = MergeEngine::new(AnalysisCache::new(), PatternLearner::new());
    let outcome = engine.merge(by_path, ResolutionStrategy::Auto).await;
    outcome.merged.get("response.md").cloned()
}

fn render(responses: &HashMap<ProviderId, String>, merged: &Option<String>) -> String {
    let mut out = String::new();
    for (provider, content) in responses {
        out.push_str(&format!("=== {} ===\n{}\n\n", provider, content));
    }
    if let Some(merged) = merged {
        out.push_str(&format!("=== merged ===\n{}\n", merged));
    }
    out.trim_end().to_string()
}
