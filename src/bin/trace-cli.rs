use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

use trace_orchestrator::context::{
    parse_traceparent, ContextCarrier, CorrelationId, TRACEPARENT, TRACESTATE, X_TRACE_ID,
};

#[derive(Parser)]
#[command(name = "trace-cli")]
#[command(about = "Exercise the orchestrator's endpoints with trace headers", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Correlation identifier sent as X-Trace-ID.
    #[arg(short, long)]
    trace_id: Option<String>,

    /// W3C traceparent to continue.
    #[arg(long, conflicts_with = "new_trace")]
    traceparent: Option<String>,

    /// Start a fresh W3C trace and send its traceparent.
    #[arg(long)]
    new_trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service health
    Health,
    /// Local simulated processing
    Process,
    /// Call service B and C concurrently
    Parallel,
    /// Call service B then C
    Sequential,
    /// Failure scenarios
    Failure {
        #[command(subcommand)]
        scenario: Scenario,
    },
    /// Call one downstream service directly
    Call {
        /// service-b or service-c
        target: String,
    },
}

#[derive(Subcommand)]
enum Scenario {
    Partial,
    Cascade,
    Chain,
    Timeout,
}

impl Commands {
    fn path(&self) -> String {
        match self {
            Commands::Health => "/health".into(),
            Commands::Process => "/api/process".into(),
            Commands::Parallel => "/api/parallel".into(),
            Commands::Sequential => "/api/sequential".into(),
            Commands::Failure { scenario } => match scenario {
                Scenario::Partial => "/api/failure/partial".into(),
                Scenario::Cascade => "/api/failure/cascade".into(),
                Scenario::Chain => "/api/failure/chain".into(),
                Scenario::Timeout => "/api/failure/timeout".into(),
            },
            Commands::Call { target } => format!("/api/call/{}", target),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(trace_id) = &cli.trace_id {
        headers.insert(X_TRACE_ID, HeaderValue::from_str(trace_id)?);
    }

    // The CLI acts as the client span; the service sees it as the parent.
    let correlation_id = cli
        .trace_id
        .as_deref()
        .map(CorrelationId::from)
        .unwrap_or_else(CorrelationId::generate);
    let carrier = match (&cli.traceparent, cli.new_trace) {
        (Some(header), _) => {
            let parent = parse_traceparent(header)
                .ok_or_else(|| format!("invalid traceparent: {}", header))?;
            Some(ContextCarrier::new(correlation_id, Some(parent)))
        }
        (None, true) => Some(ContextCarrier::new(correlation_id, None)),
        (None, false) => None,
    };
    if let Some(carrier) = carrier {
        if let Some(traceparent) = carrier.traceparent() {
            println!("traceparent: {}", traceparent);
        }
        let mut propagated = HeaderMap::new();
        carrier.inject(&mut propagated);
        for name in [TRACEPARENT, TRACESTATE] {
            if let Some(value) = propagated.remove(name) {
                headers.insert(name, value);
            }
        }
    }

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let trace_id = res
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("<missing>")
        .to_string();

    println!("status: {}", status);
    println!("x-trace-id: {}", trace_id);

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if text.is_empty() => {}
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
    }
    Ok(())
}
