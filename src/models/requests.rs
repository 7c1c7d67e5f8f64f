use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::{MatchCandidate, ValidationLabel};

/// Request for column recommendations on an uploaded table
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendColumnsRequest {
    #[validate(length(min = 1))]
    pub table_name: String,
}

/// Request to combine the selected columns into a matching key
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CombineColumnsRequest {
    #[validate(length(min = 1, message = "select at least one column"))]
    pub columns: Vec<String>,
}

/// Validation decision for a single candidate pair
///
/// The service identifies the row by its fuzzy/similarity score pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub fuzzy_combined: f64,
    pub faiss_score: f64,
    pub user_validasi: ValidationLabel,
}

impl ValidateRequest {
    pub fn new(candidate: &MatchCandidate, label: ValidationLabel) -> Self {
        Self {
            fuzzy_combined: candidate.fuzzy_score,
            faiss_score: candidate.similarity_score,
            user_validasi: label,
        }
    }
}
