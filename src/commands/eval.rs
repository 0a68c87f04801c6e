use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cli::EvalArgs;
use crate::client::{ClientTuning, ServiceClient};
use crate::model::{EvaluationReport, EvaluationSummary, QueryResult, QueryStatus};
use crate::stats::summarize;
use crate::util::{now_utc_string, truncate_chars, write_json_pretty};

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const WARMUP_BACKOFF: Duration = Duration::from_secs(30);
const PROBE_BACKOFF: Duration = Duration::from_secs(10);

const DEFAULT_QUERIES: [&str; 10] = [
    "What is artificial intelligence and how does it work?",
    "Explain the concept of machine learning in simple terms.",
    "What are the main applications of AI in healthcare?",
    "How does natural language processing work?",
    "What is the difference between supervised and unsupervised learning?",
    "Explain the concept of neural networks.",
    "What are the ethical considerations in AI development?",
    "How does computer vision technology work?",
    "What is deep learning and why is it important?",
    "Explain the concept of reinforcement learning.",
];

pub fn run(args: EvalArgs) -> Result<()> {
    let queries = resolve_queries(&args.queries);

    let client = ServiceClient::new(
        &args.service_url,
        ClientTuning {
            attempt_timeout: ATTEMPT_TIMEOUT,
            query_timeout: Duration::from_secs(args.query_timeout_secs),
            warmup_backoff: WARMUP_BACKOFF,
            probe_backoff: PROBE_BACKOFF,
        },
    )?;

    info!(
        service_url = %args.service_url,
        query_count = queries.len(),
        "starting evaluation"
    );

    if !args.no_wait && !client.wait_until_ready(Duration::from_secs(args.max_wait_secs)) {
        error!("cannot evaluate: service did not become ready");
        return Ok(());
    }

    let results = run_queries(&client, &queries);

    let report = EvaluationReport {
        timestamp: now_utc_string(),
        service_url: args.service_url.clone(),
        evaluation_summary: summarize(&results),
        detailed_results: results,
    };

    write_json_pretty(&args.output, &report)?;
    info!(path = %args.output.display(), "wrote evaluation report");

    log_summary(&report.evaluation_summary);

    Ok(())
}

fn resolve_queries(queries: &[String]) -> Vec<String> {
    if queries.is_empty() {
        DEFAULT_QUERIES.iter().map(|query| query.to_string()).collect()
    } else {
        queries.to_vec()
    }
}

pub fn run_queries(client: &ServiceClient, queries: &[String]) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(queries.len());

    for (index, query) in queries.iter().enumerate() {
        info!(
            current = index + 1,
            total = queries.len(),
            query = %truncate_chars(query, 50),
            "sending query"
        );

        let result = client.run_query(query);
        match result.status {
            QueryStatus::Success => {
                info!(response_time_secs = result.response_time, "query succeeded");
            }
            QueryStatus::Error | QueryStatus::Exception => {
                warn!(
                    error = %result.error.as_deref().unwrap_or("unknown error"),
                    "query failed"
                );
            }
        }
        results.push(result);
    }

    results
}

fn log_summary(summary: &EvaluationSummary) {
    match summary {
        EvaluationSummary::NoSuccesses {
            error,
            total_queries,
            success_rate,
            ..
        } => {
            warn!(
                total_queries = *total_queries,
                success_rate = *success_rate,
                error = %error,
                "evaluation finished without successful responses"
            );
        }
        EvaluationSummary::Stats {
            total_queries,
            successful_queries,
            success_rate,
            response_time_stats,
            response_quality,
        } => {
            info!(
                total_queries = *total_queries,
                successful_queries = *successful_queries,
                success_rate = *success_rate,
                mean_secs = response_time_stats.mean,
                median_secs = response_time_stats.median,
                min_secs = response_time_stats.min,
                max_secs = response_time_stats.max,
                std_secs = response_time_stats.std,
                avg_response_chars = response_quality.avg_response_length,
                "evaluation summary"
            );
        }
    }
}
