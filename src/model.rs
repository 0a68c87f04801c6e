use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
    Exception,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub response: String,
    pub response_time: f64,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseTimeStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseQuality {
    pub avg_response_length: f64,
    pub avg_response_length_chars: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EvaluationSummary {
    NoSuccesses {
        error: String,
        total_queries: usize,
        successful_queries: usize,
        success_rate: f64,
    },
    Stats {
        total_queries: usize,
        successful_queries: usize,
        success_rate: f64,
        response_time_stats: ResponseTimeStats,
        response_quality: ResponseQuality,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickSummary {
    pub total_queries: usize,
    pub successful_queries: usize,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub avg_response_length: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport<S> {
    pub timestamp: String,
    pub service_url: String,
    pub evaluation_summary: S,
    pub detailed_results: Vec<QueryResult>,
}
