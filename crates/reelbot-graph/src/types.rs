//! Response shapes for the handful of Graph API endpoints the client calls.

use reelbot_core::EngagementCounts;
use serde::Deserialize;

/// `{"id": "..."}` returned by container creation and `media_publish`.
#[derive(Debug, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

/// Processing state of a media container.
#[derive(Debug, Deserialize)]
pub struct ContainerStatus {
    /// `IN_PROGRESS`, `FINISHED`, `ERROR`, `EXPIRED`, or `PUBLISHED`.
    pub status_code: Option<String>,
    /// Human-readable detail, populated on errors.
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermalinkResponse {
    pub permalink: Option<String>,
}

/// `/{media-id}/insights` envelope.
#[derive(Debug, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub data: Vec<InsightMetric>,
}

#[derive(Debug, Deserialize)]
pub struct InsightMetric {
    pub name: String,
    #[serde(default)]
    pub values: Vec<InsightValue>,
    /// Newer API versions report a single total instead of `values`.
    pub total_value: Option<InsightValue>,
}

#[derive(Debug, Deserialize)]
pub struct InsightValue {
    #[serde(default)]
    pub value: i64,
}

/// Error envelope: `{"error": {"message": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: Option<i64>,
}

impl InsightMetric {
    fn value(&self) -> i64 {
        self.total_value
            .as_ref()
            .or_else(|| self.values.last())
            .map_or(0, |v| v.value)
    }
}

impl InsightsResponse {
    /// Folds the named metrics into counts. Missing metrics count as zero.
    #[must_use]
    pub fn counts(&self) -> EngagementCounts {
        let mut counts = EngagementCounts::default();
        for metric in &self.data {
            let value = metric.value();
            match metric.name.as_str() {
                "likes" => counts.likes = value,
                "comments" => counts.comments = value,
                "shares" => counts.shares = value,
                "reach" => counts.reach = value,
                "saved" => counts.saves = value,
                _ => {}
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reads_values_and_total_value_forms() {
        let body = serde_json::json!({
            "data": [
                { "name": "likes", "period": "lifetime", "values": [{ "value": 120 }] },
                { "name": "comments", "values": [{ "value": 9 }] },
                { "name": "reach", "total_value": { "value": 4100 } },
                { "name": "saved", "values": [{ "value": 31 }] },
                { "name": "plays", "values": [{ "value": 9999 }] }
            ]
        });
        let parsed: InsightsResponse = serde_json::from_value(body).unwrap();
        let counts = parsed.counts();
        assert_eq!(counts.likes, 120);
        assert_eq!(counts.comments, 9);
        assert_eq!(counts.shares, 0);
        assert_eq!(counts.reach, 4100);
        assert_eq!(counts.saves, 31);
    }
}
