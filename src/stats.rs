use crate::model::{
    EvaluationSummary, QueryResult, QueryStatus, ResponseQuality, ResponseTimeStats,
};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|left, right| left.total_cmp(right));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn min_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

// Sample standard deviation; a single observation has no spread, not an error.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let Some(center) = mean(values) else {
        return 0.0;
    };

    let variance = values
        .iter()
        .map(|value| (value - center).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    successful as f64 / total as f64 * 100.0
}

pub fn summarize(results: &[QueryResult]) -> EvaluationSummary {
    let successful: Vec<&QueryResult> = results
        .iter()
        .filter(|result| result.status == QueryStatus::Success)
        .collect();
    let rate = success_rate(successful.len(), results.len());

    if successful.is_empty() {
        return EvaluationSummary::NoSuccesses {
            error: "No successful responses to evaluate".to_string(),
            total_queries: results.len(),
            successful_queries: 0,
            success_rate: rate,
        };
    }

    let response_times: Vec<f64> = successful
        .iter()
        .map(|result| result.response_time)
        .collect();
    let response_lengths: Vec<f64> = successful
        .iter()
        .map(|result| result.response.chars().count() as f64)
        .collect();
    let avg_response_length = mean(&response_lengths).unwrap_or(0.0);

    EvaluationSummary::Stats {
        total_queries: results.len(),
        successful_queries: successful.len(),
        success_rate: rate,
        response_time_stats: ResponseTimeStats {
            mean: mean(&response_times).unwrap_or(0.0),
            median: median(&response_times).unwrap_or(0.0),
            min: min_value(&response_times).unwrap_or(0.0),
            max: max_value(&response_times).unwrap_or(0.0),
            std: sample_std_dev(&response_times),
        },
        response_quality: ResponseQuality {
            avg_response_length,
            avg_response_length_chars: avg_response_length,
        },
    }
}
