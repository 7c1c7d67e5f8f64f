// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{Ack, CandidateGroup, CandidateId, JobHandle, JobProgress, MatchCandidate, MatchResults, ValidationLabel};
pub use requests::{CombineColumnsRequest, RecommendColumnsRequest, ValidateRequest};
pub use responses::{ColumnRecommendation, CombineColumnsResponse, ErrorResponse, RecommendColumnsResponse, StartMatchResponse, UploadResponse};
