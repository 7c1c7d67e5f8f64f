use serde::{Deserialize, Serialize};

/// Response for the upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub columns: Vec<String>,
}

/// One recommended column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRecommendation {
    pub column: String,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// Response for the column recommendation endpoint
///
/// Older deployments answer with a flat `recommended_columns` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendColumnsResponse {
    #[serde(default)]
    pub recommendations: Vec<ColumnRecommendation>,
    #[serde(default)]
    pub recommended_columns: Vec<String>,
}

impl RecommendColumnsResponse {
    pub fn into_columns(self) -> Vec<String> {
        if self.recommendations.is_empty() {
            self.recommended_columns
        } else {
            self.recommendations.into_iter().map(|r| r.column).collect()
        }
    }
}

/// Response for the combine endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombineColumnsResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub combined_sample: Vec<String>,
}

/// Response for the match trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartMatchResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned by the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn describe(&self) -> Option<String> {
        self.error.clone().or_else(|| self.message.clone())
    }
}
