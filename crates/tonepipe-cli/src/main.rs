use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tonepipe_core::{
    AnalysisMode, AnalysisRequest, AnalysisResult, ApiKey, CredentialSource, Dimension,
    MAX_BATCH_URLS,
};
use tonepipe_local::{
    Analyzer, AnalyzerConfig, CsvExport, FallbackContent, ProxyChain, ScorerSettings,
};

#[derive(Parser, Debug)]
#[command(name = "tonepipe")]
#[command(about = "Brand tone analysis for web pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch up to five pages and score their tone of voice.
    Analyze(AnalyzeCmd),
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    /// Page URLs (http/https), analyzed concurrently. At most five.
    #[arg(required = true)]
    urls: Vec<String>,
    /// Display label for the URL in the same position (repeatable). Defaults to the host.
    #[arg(long = "label")]
    labels: Vec<String>,
    /// Your own API key for AI scoring. Without it the managed key is used, if configured.
    #[arg(long, env = "TONEPIPE_OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Output format: json|csv|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Write output here instead of stdout. For csv, a directory gets the default file name.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Fallback text source: refetch|reuse (overrides TONEPIPE_FALLBACK_CONTENT).
    #[arg(long)]
    fallback_content: Option<String>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(serde::Serialize)]
struct AnalyzeReport<'a> {
    schema_version: u64,
    kind: &'static str,
    ok: bool,
    name: &'static str,
    version: &'static str,
    results: &'a [AnalysisResult],
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

/// `KEY=VALUE` lines from `TONEPIPE_ENV_FILE`. Never overrides the process environment.
fn load_env_file() {
    let Ok(p) = std::env::var("TONEPIPE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_requests(args: &AnalyzeCmd) -> Result<Vec<AnalysisRequest>> {
    if args.urls.len() > MAX_BATCH_URLS {
        anyhow::bail!(
            "invalid input: at most {MAX_BATCH_URLS} URLs per run (got {})",
            args.urls.len()
        );
    }
    if args.labels.len() > args.urls.len() {
        anyhow::bail!(
            "invalid input: {} labels given for {} URLs",
            args.labels.len(),
            args.urls.len()
        );
    }
    let credential = match args.api_key.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => CredentialSource::User(ApiKey::parse(raw)?),
        None => CredentialSource::Managed,
    };
    args.urls
        .iter()
        .enumerate()
        .map(|(i, u)| -> Result<AnalysisRequest> {
            let req = AnalysisRequest::new(u, args.labels.get(i).map(String::as_str))?;
            Ok(req.with_credential(credential.clone()))
        })
        .collect()
}

fn render_text(results: &[AnalysisResult]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(&format!("{} <{}> mode={}\n", r.label(), r.url(), r.mode().as_str()));
        match r.analysis() {
            Some(a) => {
                for d in Dimension::ALL {
                    let td = a.profile.dimension(d);
                    out.push_str(&format!(
                        "  {:<15}{:>3}  {}\n",
                        d.name(),
                        td.score,
                        td.dominant_term
                    ));
                }
                out.push_str(&format!(
                    "  average={} dominant={} sample_chars={}\n",
                    a.average_score(),
                    a.dominant_trait(),
                    a.sample_size
                ));
            }
            None => out.push_str(&format!("  error: {}\n", r.error().unwrap_or("unknown"))),
        }
    }
    out
}

async fn run_analyze(args: AnalyzeCmd) -> Result<()> {
    let format = args.output.to_ascii_lowercase();
    if !matches!(format.as_str(), "json" | "csv" | "text") {
        anyhow::bail!(
            "invalid input: unknown output format {format:?} (expected json, csv or text)"
        );
    }
    let reqs = build_requests(&args)?;
    let mut config = AnalyzerConfig::from_env()?;
    if let Some(mode) = args.fallback_content.as_deref() {
        config.fallback_content = mode.parse::<FallbackContent>()?;
    }
    let analyzer = Analyzer::local(config)?;
    let results = analyzer.analyze_batch(&reqs).await?;

    let export = CsvExport::now();
    let body = match format.as_str() {
        "csv" => match export.render(&results) {
            Some(csv) => csv,
            None => anyhow::bail!("no scored results to export"),
        },
        "text" => render_text(&results),
        _ => {
            let report = AnalyzeReport {
                schema_version: 1,
                kind: "analyze",
                ok: results.iter().all(|r| r.mode() != AnalysisMode::Error),
                name: "tonepipe",
                version: env!("CARGO_PKG_VERSION"),
                results: &results,
            };
            serde_json::to_string_pretty(&report)?
        }
    };

    match args.out {
        Some(path) => {
            let path = if format == "csv" && path.is_dir() {
                path.join(export.file_name(results.len() > 1))
            } else {
                path
            };
            std::fs::write(&path, body)?;
            println!("{}", path.display());
        }
        None => println!("{body}"),
    }
    Ok(())
}

fn run_doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();
    let mut checks: Vec<serde_json::Value> = Vec::new();

    let user_key = std::env::var("TONEPIPE_OPENAI_API_KEY").ok();
    let user_key_valid = user_key
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| ApiKey::parse(s).map(|_| ()));
    if let Some(res) = &user_key_valid {
        checks.push(serde_json::json!({
            "name": "user_api_key_format",
            "ok": res.is_ok(),
            "error": res.as_ref().err().map(|e| e.to_string()),
        }));
    }

    let proxies = tonepipe_local::http_client_from_env()
        .and_then(ProxyChain::from_env)
        .map(|c| c.strategy_names());
    checks.push(serde_json::json!({
        "name": "proxy_chain",
        "ok": proxies.is_ok(),
        "error": proxies.as_ref().err().map(|e| e.to_string()),
    }));

    let analyzer_config = AnalyzerConfig::from_env();
    checks.push(serde_json::json!({
        "name": "analyzer_config",
        "ok": analyzer_config.is_ok(),
        "error": analyzer_config.as_ref().err().map(|e| e.to_string()),
    }));

    let scorer = ScorerSettings::from_env();
    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "tonepipe",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "credentials": {
                "user_key": user_key_valid.is_some(),
                "managed_key": has_env("TONEPIPE_MANAGED_API_KEY"),
            },
            "scorer": {
                "base_url": scorer.base_url,
                "model": scorer.model,
                "timeout_ms": scorer.timeout_ms,
            },
            "proxies": proxies.as_ref().ok(),
            "fallback_content": analyzer_config
                .as_ref()
                .ok()
                .map(|c| c.fallback_content.as_str()),
        },
        "checks": checks,
    });

    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("tonepipe {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!(
                "credentials: user_key={} managed_key={}",
                payload["configured"]["credentials"]["user_key"]
                    .as_bool()
                    .unwrap_or(false),
                payload["configured"]["credentials"]["managed_key"]
                    .as_bool()
                    .unwrap_or(false),
            );
            println!(
                "scorer: {} model={}",
                payload["configured"]["scorer"]["base_url"]
                    .as_str()
                    .unwrap_or(""),
                payload["configured"]["scorer"]["model"]
                    .as_str()
                    .unwrap_or(""),
            );
            println!("checks:");
            if let Some(arr) = payload["checks"].as_array() {
                for c in arr {
                    let name = c["name"].as_str().unwrap_or("?");
                    let ok = c["ok"].as_bool().unwrap_or(false);
                    println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                }
            }
        }
        _ => println!("{payload}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await?,
        Commands::Doctor(args) => run_doctor(args)?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "tonepipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("tonepipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(urls: &[&str], labels: &[&str], api_key: Option<&str>) -> AnalyzeCmd {
        AnalyzeCmd {
            urls: urls.iter().map(|s| s.to_string()).collect(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            api_key: api_key.map(str::to_string),
            output: "json".to_string(),
            out: None,
            fallback_content: None,
        }
    }

    #[test]
    fn labels_pair_with_urls_by_position() {
        let reqs = build_requests(&cmd(
            &["https://a.example/", "https://b.example/"],
            &["Alpha"],
            None,
        ))
        .unwrap();
        assert_eq!(reqs[0].label(), "Alpha");
        assert_eq!(reqs[1].label(), "b.example");
        assert_eq!(reqs[0].credential(), &CredentialSource::Managed);
    }

    #[test]
    fn rejects_bad_batches_and_keys() {
        let six: Vec<String> = (0..6).map(|i| format!("https://s{i}.example/")).collect();
        let six: Vec<&str> = six.iter().map(String::as_str).collect();
        assert!(build_requests(&cmd(&six, &[], None)).is_err());
        assert!(build_requests(&cmd(&["https://a.example/"], &["A", "B"], None)).is_err());
        assert!(build_requests(&cmd(&["ftp://a.example/"], &[], None)).is_err());
        let err = build_requests(&cmd(&["https://a.example/"], &[], Some("sk-short"))).unwrap_err();
        assert!(err.to_string().contains("invalid credential"));
    }

    #[test]
    fn user_key_applies_to_every_request() {
        let key = format!("sk-{}", "a".repeat(45));
        let reqs = build_requests(&cmd(
            &["https://a.example/", "https://b.example/"],
            &[],
            Some(&key),
        ))
        .unwrap();
        for r in &reqs {
            assert!(matches!(r.credential(), CredentialSource::User(k) if k.expose() == key));
        }
    }
}
