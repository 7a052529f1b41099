//! Capture and analyze subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use netlens_analysis::{
    AnalysisOutcome, NetworkAnalyzer, UrlSuggester, normalize_target_url, render_raw_report,
};
use netlens_browser_cdp::CdpBrowser;
use netlens_capture::{
    CaptureError, CaptureRequest, CaptureResult, CaptureService, UrlFilter, summarize,
};
use netlens_config::Config;
use netlens_protocols::provider::LLMProvider;
use netlens_provider_gemini::GeminiProvider;

use crate::adapters::{analyzer_settings, capture_config, fallback_affinity, resolve_api_key};
use crate::cli::OutputFormat;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Capture only, then print or write the raw data.
pub(crate) async fn run_capture(
    config: &Config,
    url: &str,
    filters: Vec<String>,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> CmdResult {
    let url = normalize_target_url(url)?;
    let result = capture(config, &url, filters).await?;
    println!("{}", summarize(&result));

    let rendered = match format {
        OutputFormat::Text => render_raw_report(&result.exchanges),
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
    };
    match output {
        Some(path) => write_report(&path, &rendered)?,
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Capture the page for a question, then answer it.
pub(crate) async fn run_analyze(
    config: &Config,
    query: &str,
    url: Option<String>,
    filters: Vec<String>,
    api_key: Option<String>,
    raw_output: Option<PathBuf>,
) -> CmdResult {
    let api_key = resolve_api_key(api_key, &config.provider)
        .ok_or("No Gemini API key. Pass --api-key, set GEMINI_API_KEY, or set provider.api_key")?;
    let provider = build_provider(config, api_key)?;

    let url = match url {
        Some(url) => normalize_target_url(&url)?,
        None => {
            let suggester = UrlSuggester::new(
                provider.clone(),
                config.provider.model.clone(),
                config.provider.temperature,
                config.provider.keyword_max_output_tokens,
            );
            let url = suggester.suggest(query).await?;
            println!("Suggested URL: {}", url);
            url
        }
    };

    let result = capture(config, &url, filters).await?;
    println!("{}", summarize(&result));
    if let Some(path) = raw_output {
        write_report(&path, &render_raw_report(&result.exchanges))?;
    }

    let analyzer = NetworkAnalyzer::new(provider, analyzer_settings(config));
    let outcome = analyzer.analyze(query, &result).await?;

    println!();
    println!("{}", outcome.text());
    if let AnalysisOutcome::Answer(report) = &outcome {
        println!();
        println!(
            "Analyzed {} of {} requests ({} relevant, ~{} tokens).",
            report.focused, report.total, report.relevant, report.estimated_tokens
        );
        if report.truncated {
            println!("Request data was truncated to fit the token budget.");
        }
        if report.used_dom_fallback {
            println!("Page content was used where network bodies could not be retrieved.");
        }
    }
    Ok(())
}

fn build_provider(
    config: &Config,
    api_key: String,
) -> Result<Arc<dyn LLMProvider>, Box<dyn std::error::Error>> {
    let provider = match &config.provider.base_url {
        Some(base_url) => GeminiProvider::with_base_url(api_key, base_url.clone())?,
        None => GeminiProvider::new(api_key)?,
    };
    Ok(Arc::new(provider))
}

/// Run one capture session. Ctrl-C stops it early and keeps what was seen.
async fn capture(
    config: &Config,
    url: &str,
    filters: Vec<String>,
) -> Result<CaptureResult, Box<dyn std::error::Error>> {
    let browser = CdpBrowser::connect(
        &config.browser.endpoint,
        Duration::from_secs(config.browser.command_timeout_secs),
    )
    .await?;
    let service = CaptureService::new(Arc::new(browser), capture_config(config))
        .with_fallback_affinity(fallback_affinity(config));

    let filter = UrlFilter::new(filters);
    if filter.is_active() {
        info!(terms = ?filter.terms(), "URL filter active");
    }
    println!("Capturing {} ...", url);

    let mut reply = service
        .start(CaptureRequest::new(url).with_filter(filter))
        .await?;
    let outcome = tokio::select! {
        outcome = &mut reply => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping capture");
            service.stop().await;
            reply.await
        }
    };
    Ok(outcome.unwrap_or(Err(CaptureError::Dropped))?)
}

fn write_report(path: &Path, content: &str) -> Result<(), std::io::Error> {
    std::fs::write(path, content)?;
    println!("Raw data written to {}", path.display());
    Ok(())
}
