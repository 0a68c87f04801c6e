use std::io::{self, BufRead, BufReader};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::model::{QueryResult, QueryStatus};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy)]
pub struct ClientTuning {
    pub attempt_timeout: Duration,
    pub query_timeout: Duration,
    pub warmup_backoff: Duration,
    pub probe_backoff: Duration,
}

pub struct ServiceClient {
    http: Client,
    base_url: String,
    tuning: ClientTuning,
}

impl ServiceClient {
    pub fn new(base_url: &str, tuning: ClientTuning) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tuning,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chatqna", self.base_url)
    }

    // The deadline is wall-clock and only checked between attempts; an
    // in-flight request is bounded by the per-attempt timeout instead.
    pub fn wait_until_ready(&self, max_wait: Duration) -> bool {
        let endpoint = self.endpoint();
        let started = Instant::now();

        info!(
            endpoint = %endpoint,
            max_wait_secs = max_wait.as_secs(),
            "waiting for service readiness"
        );

        while started.elapsed() < max_wait {
            let attempt = self
                .http
                .post(&endpoint)
                .timeout(self.tuning.attempt_timeout)
                .json(&json!({ "messages": "test" }))
                .send();

            match attempt {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::OK {
                        info!("service is ready");
                        return true;
                    }
                    if status == StatusCode::INTERNAL_SERVER_ERROR {
                        // Service answers but the model is still warming up.
                        info!("service is up, model still warming");
                        thread::sleep(self.tuning.warmup_backoff);
                    } else {
                        warn!(status = status.as_u16(), "unexpected readiness status");
                        thread::sleep(self.tuning.probe_backoff);
                    }
                }
                Err(err) => {
                    debug!(error = %err, "service not reachable yet");
                    thread::sleep(self.tuning.probe_backoff);
                }
            }
        }

        warn!("service did not become ready before the deadline");
        false
    }

    // All failure modes fold into the returned QueryResult; a batch never
    // aborts because one query went wrong.
    pub fn run_query(&self, query: &str) -> QueryResult {
        match self.try_query(query) {
            Ok(result) => result,
            Err(err) => QueryResult {
                query: query.to_string(),
                response: String::new(),
                response_time: 0.0,
                status: QueryStatus::Exception,
                status_code: None,
                error: Some(format!("{err:#}")),
            },
        }
    }

    fn try_query(&self, query: &str) -> Result<QueryResult> {
        let started = Instant::now();

        let response = self
            .http
            .post(self.endpoint())
            .timeout(self.tuning.query_timeout)
            .json(&json!({ "messages": query }))
            .send()
            .context("request failed")?;

        let status = response.status();
        if status != StatusCode::OK {
            let elapsed = started.elapsed().as_secs_f64();
            let body = response
                .text()
                .context("failed to read error response body")?;

            return Ok(QueryResult {
                query: query.to_string(),
                response: String::new(),
                response_time: elapsed,
                status: QueryStatus::Error,
                status_code: Some(status.as_u16()),
                error: Some(body),
            });
        }

        let assembled = collect_sse_response(BufReader::new(response))
            .context("failed to read event stream")?;
        let elapsed = started.elapsed().as_secs_f64();

        Ok(QueryResult {
            query: query.to_string(),
            response: assembled,
            response_time: elapsed,
            status: QueryStatus::Success,
            status_code: Some(status.as_u16()),
            error: None,
        })
    }
}

pub fn collect_sse_response(reader: impl BufRead) -> io::Result<String> {
    let mut assembled = String::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        if payload == DONE_SENTINEL {
            break;
        }
        if payload.is_empty() {
            continue;
        }

        match decode_chunk(payload) {
            Some(decoded) => assembled.push_str(&decoded),
            None => assembled.push_str(payload),
        }
    }

    Ok(assembled)
}

// Streamed chunks are usually base64; anything that fails to decode as
// base64-wrapped UTF-8 is passed through as plain text.
pub fn decode_chunk(data: &str) -> Option<String> {
    let bytes = BASE64_STANDARD.decode(data).ok()?;
    String::from_utf8(bytes).ok()
}
