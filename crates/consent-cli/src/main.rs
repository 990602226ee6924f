//! consent-filter: runs a JSON resource tree through the consent pipeline.
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONSENT_*`)
//! 3. Project config (`.consent/config.toml` in the project root)
//! 4. `--config FILE`, or the global config (`~/.consent/config.toml`)
//! 5. Default values (lowest priority)
//!
//! # Output
//!
//! One JSON document per served page on stdout. A page with nothing left
//! to show prints `{"status":204}`. Logs go to stderr.
//!
//! # Exit Codes
//!
//! - `0`: success
//! - `1`: invalid input or configuration
//! - `2`: request refused (e.g. `_total=accurate`); stderr carries the
//!   error code

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use consent_hook::{ConsentChain, ConsentService, OperationContext, OperationKind, RulePolicy};
use consent_runtime::config::{ConfigLoader, ConsentConfig};
use consent_runtime::{
    AuditService, ConsentPipeline, ConsentResponse, PagingError, PipelineError, SearchPager,
};
use consent_types::{ErrorCode, ResourceNode};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use url::Url;

/// Exit code for refused requests.
const EXIT_REFUSED: i32 = 2;

/// Run a JSON resource bundle through the consent pipeline
#[derive(Parser, Debug)]
#[command(name = "consent-filter")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON resource or bundle to filter (`-` reads stdin)
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Config file to use instead of the global config
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Project root holding `.consent/config.toml` (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Skip the global config file
    #[arg(long)]
    no_global: bool,

    /// Kind of operation to simulate
    #[arg(short, long, value_enum, default_value_t = KindArg::Search)]
    kind: KindArg,

    /// Resource type of the operation (defaults to the type of the first entry)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    resource_type: Option<String>,

    /// Request parameter, e.g. `_total=estimated` (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Requesting principal, passed to the policy
    #[arg(long)]
    principal: Option<String>,

    /// Page size for searches (sets `_count`)
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,

    /// Serve every page of a search instead of only the first
    #[arg(long)]
    all_pages: bool,

    /// Base URL that page links are built on
    #[arg(long, value_name = "URL", default_value = "http://localhost/fhir")]
    base_url: Url,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Search,
    Read,
    Metadata,
}

impl From<KindArg> for OperationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Search => Self::Search,
            KindArg::Read => Self::Read,
            KindArg::Metadata => Self::Metadata,
        }
    }
}

/// Failure while serving one operation's output.
#[derive(Debug, Error)]
enum ServeError {
    #[error(transparent)]
    Paging(#[from] PagingError),

    #[error("cannot render response: {0}")]
    Render(#[from] serde_json::Error),

    #[error("cannot write response: {0}")]
    Write(#[from] std::io::Error),
}

impl ErrorCode for ServeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Paging(e) => e.code(),
            Self::Render(_) => "CLI_RENDER",
            Self::Write(_) => "CLI_WRITE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Paging(e) => e.is_recoverable(),
            Self::Render(_) => false,
            Self::Write(_) => true,
        }
    }
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let config = load_config(&args)?;
    let pipeline = ConsentPipeline::with_config(build_policy(&config)?, &config);
    info!(
        enabled = pipeline.is_enabled(),
        rules = config.rules.rules.len(),
        "Pipeline ready"
    );

    let input = read_input(&args.input)?;
    let ctx = operation_context(&args, &input);

    let outcome = match args.kind {
        KindArg::Search => run_search(&args, &config, pipeline, ctx, input),
        KindArg::Read | KindArg::Metadata => run_single(&pipeline, ctx, input),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(PipelineError::Modifier(refused)) => {
            eprintln!("error[{}]: {refused}", refused.code());
            std::process::exit(EXIT_REFUSED);
        }
        Err(PipelineError::Downstream(err)) => {
            let code = err.code();
            Err(anyhow!(err).context(format!("serving failed [{code}]")))
        }
    }
}

/// Terminal filter: --debug > --verbose > RUST_LOG env > default "warn".
fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // stdout carries the filtered documents
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .init();
}

fn load_config(args: &Args) -> Result<ConsentConfig> {
    let project_root = args.project.clone().unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to get current directory, using '.'");
            PathBuf::from(".")
        })
    });

    let mut loader = ConfigLoader::new().with_project_root(project_root);
    if let Some(ref path) = args.config {
        loader = loader.with_config_file(path.clone());
    }
    if args.no_global {
        loader = loader.skip_global_config();
    }

    loader
        .load()
        .map_err(|e| anyhow!("Config error [{}]: {e}", e.code()))
}

/// Audit first, then the configured rules.
fn build_policy(config: &ConsentConfig) -> Result<Arc<dyn ConsentService>> {
    let rules = RulePolicy::from_config(&config.rules).context("invalid consent rules")?;

    let mut chain = ConsentChain::new();
    chain.register("audit", 0, Arc::new(AuditService::new()));
    chain.register("rules", 100, Arc::new(rules));
    Ok(Arc::new(chain))
}

fn read_input(path: &Path) -> Result<ResourceNode> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("cannot read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("invalid resource JSON in {}", path.display()))
}

fn operation_context(args: &Args, input: &ResourceNode) -> OperationContext {
    let mut ctx = OperationContext::new(args.kind.into());

    let resource_type = args.resource_type.clone().or_else(|| match input {
        ResourceNode::Container(c) => c.entries.first().map(|e| e.resource_type().to_string()),
        ResourceNode::Resource(r) => Some(r.resource_type.clone()),
    });
    if let Some(resource_type) = resource_type {
        ctx = ctx.with_resource_type(resource_type);
    }

    for (name, value) in &args.params {
        ctx = ctx.with_param(name.clone(), value.clone());
    }
    if let Some(n) = args.page_size {
        ctx = ctx.with_param("_count", n.to_string());
    }
    if let Some(ref principal) = args.principal {
        ctx = ctx.with_principal(principal.clone());
    }
    ctx
}

fn run_search(
    args: &Args,
    config: &ConsentConfig,
    pipeline: ConsentPipeline,
    ctx: OperationContext,
    input: ResourceNode,
) -> Result<(), PipelineError<ServeError>> {
    let candidates = match input {
        ResourceNode::Container(c) => c.entries,
        node @ ResourceNode::Resource(_) => vec![node],
    };

    let pager = SearchPager::in_memory(pipeline, config.paging.clone(), args.base_url.clone());
    let mut page = pager.search_with(ctx, candidates, print_response)?;

    if args.all_pages {
        while let Some(next) = pager.next_with(&page, print_response) {
            page = next?;
        }
    }
    Ok(())
}

fn run_single(
    pipeline: &ConsentPipeline,
    ctx: OperationContext,
    input: ResourceNode,
) -> Result<(), PipelineError<ServeError>> {
    pipeline.execute_with(ctx, |_| Ok(input), print_response)
}

/// Writes the response to stdout while its operation is still open.
fn print_response(response: ConsentResponse) -> Result<(), ServeError> {
    write_response(&mut std::io::stdout().lock(), &response)
}

fn write_response(out: &mut impl Write, response: &ConsentResponse) -> Result<(), ServeError> {
    match response.content() {
        Some(node) => serde_json::to_writer(&mut *out, node)?,
        None => write!(out, "{{\"status\":{}}}", response.status_code())?,
    }
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["consent-filter", "--input", "bundle.json"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    // ── Arguments ───────────────────────────────────────────

    #[test]
    fn defaults() {
        let a = args(&[]);
        assert_eq!(a.kind, KindArg::Search);
        assert!(a.params.is_empty());
        assert!(!a.all_pages);
        assert_eq!(a.base_url.as_str(), "http://localhost/fhir");
    }

    #[test]
    fn base_url_must_be_absolute() {
        let argv = ["consent-filter", "--input", "b.json", "--base-url", "fhir"];
        assert!(Args::try_parse_from(argv).is_err());

        let a = args(&["--base-url", "https://ehr.example/fhir?tenant=a"]);
        assert_eq!(a.base_url.query(), Some("tenant=a"));
    }

    #[test]
    fn repeated_params() {
        let a = args(&["-p", "_total=none", "--param", "name=smith"]);
        assert_eq!(
            a.params,
            vec![
                ("_total".to_string(), "none".to_string()),
                ("name".to_string(), "smith".to_string()),
            ]
        );
    }

    #[test]
    fn param_requires_name() {
        assert!(parse_param("=x").is_err());
        assert!(parse_param("novalue").is_err());
        assert_eq!(parse_param("a=").unwrap(), ("a".into(), String::new()));
    }

    // ── Output ──────────────────────────────────────────────

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn no_content_is_written_as_status() {
        let mut out = Vec::new();
        write_response(&mut out, &ConsentResponse::NoContent).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"status\":204}\n");
    }

    #[test]
    fn write_failure_is_reported() {
        let err = write_response(&mut ClosedPipe, &ConsentResponse::NoContent).unwrap_err();
        assert!(matches!(err, ServeError::Write(_)));
        assert_eq!(err.code(), "CLI_WRITE");
    }

    #[test]
    fn render_failure_fails_the_operation() {
        let audit = Arc::new(AuditService::new());
        let pipeline = ConsentPipeline::new(audit.clone());
        let input: ResourceNode =
            serde_json::from_str(r#"{"resourceType":"Patient","id":"PTA"}"#).unwrap();

        let err = pipeline
            .execute_with(
                OperationContext::new(OperationKind::Read),
                |_| Ok(input),
                |response| write_response(&mut ClosedPipe, &response),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Downstream(ServeError::Write(_))));
        let counters = audit.counters();
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.succeeded, 0);
    }

    // ── Context ─────────────────────────────────────────────

    #[test]
    fn context_takes_type_from_first_entry() {
        let input: ResourceNode = serde_json::from_str(
            r#"{"resourceType":"Bundle","type":"searchset",
                "entry":[{"resource":{"resourceType":"Observation","id":"1"}}]}"#,
        )
        .unwrap();
        let ctx = operation_context(&args(&["--page-size", "5"]), &input);

        assert_eq!(ctx.kind, OperationKind::Search);
        assert_eq!(ctx.resource_type.as_deref(), Some("Observation"));
        assert_eq!(ctx.param("_count"), Some("5"));
    }

    #[test]
    fn context_type_override_and_kind() {
        let input: ResourceNode =
            serde_json::from_str(r#"{"resourceType":"Patient","id":"PTA"}"#).unwrap();
        let ctx = operation_context(
            &args(&["--kind", "read", "--type", "Person", "--principal", "dr-who"]),
            &input,
        );

        assert_eq!(ctx.kind, OperationKind::Read);
        assert_eq!(ctx.resource_type.as_deref(), Some("Person"));
        assert_eq!(ctx.principal.as_deref(), Some("dr-who"));
    }
}
