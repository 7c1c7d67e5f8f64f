use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Stable identity assigned to a candidate when it enters a review queue.
///
/// The matching service hands back rows without any key, so positions are
/// the only thing it knows about. Positions shift every time a row is
/// validated, which makes them useless as handles across an await point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(Uuid);

impl CandidateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CandidateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human decision on a candidate pair
///
/// Encoded as `1` (match) / `0` (non-match) on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationLabel {
    Match,
    NonMatch,
}

impl ValidationLabel {
    pub fn as_flag(self) -> u8 {
        match self {
            ValidationLabel::Match => 1,
            ValidationLabel::NonMatch => 0,
        }
    }

    /// Interpret a loosely typed wire value (`1`, `0.0`, `true`, `"1"`...)
    pub fn from_value(value: &Value) -> Option<Self> {
        flag_from_value(value).map(|flag| {
            if flag {
                ValidationLabel::Match
            } else {
                ValidationLabel::NonMatch
            }
        })
    }
}

impl fmt::Display for ValidationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLabel::Match => write!(f, "match"),
            ValidationLabel::NonMatch => write!(f, "non-match"),
        }
    }
}

impl Serialize for ValidationLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_flag())
    }
}

impl<'de> Deserialize<'de> for ValidationLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ValidationLabel::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid validation label: {}", value)))
    }
}

/// Reads the 0/1 flags the service emits. Null, NaN and anything
/// unrecognised are treated as "not set".
fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "match" => Some(true),
            "0" | "false" | "non-match" | "nonmatch" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(flag_from_value))
}

fn deserialize_optional_label<'de, D>(deserializer: D) -> Result<Option<ValidationLabel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(ValidationLabel::from_value))
}

fn serialize_optional_flag<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(flag) => serializer.serialize_u8(u8::from(*flag)),
        None => serializer.serialize_none(),
    }
}

/// One potential duplicate pair returned by the matching service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    #[serde(rename = "combined_1")]
    pub combined_key_a: String,
    #[serde(rename = "combined_2")]
    pub combined_key_b: String,
    #[serde(rename = "faiss_score")]
    pub similarity_score: f64,
    #[serde(rename = "fuzzy_combined", alias = "fuzzy_score", default)]
    pub fuzzy_score: f64,
    #[serde(
        rename = "predicted",
        default,
        deserialize_with = "deserialize_optional_flag",
        serialize_with = "serialize_optional_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub predicted_label: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(
        rename = "user_validasi",
        default,
        deserialize_with = "deserialize_optional_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_validation: Option<ValidationLabel>,
    /// Columns the service sends that the workflow does not interpret
    /// (row ids, batch ids...). Kept so undo can echo the row back intact.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MatchCandidate {
    pub fn new(
        combined_key_a: impl Into<String>,
        combined_key_b: impl Into<String>,
        similarity_score: f64,
        fuzzy_score: f64,
    ) -> Self {
        Self {
            combined_key_a: combined_key_a.into(),
            combined_key_b: combined_key_b.into(),
            similarity_score,
            fuzzy_score,
            predicted_label: None,
            confidence: None,
            user_validation: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_prediction(mut self, predicted: bool, confidence: f64) -> Self {
        self.predicted_label = Some(predicted);
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn is_reviewed(&self) -> bool {
        self.user_validation.is_some()
    }
}

/// Which result group a queued candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateGroup {
    Ambiguous,
    Confident,
}

/// Progress of the remote matching job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawProgress")]
pub struct JobProgress {
    pub current: u64,
    pub total: u64,
}

#[derive(Deserialize)]
struct RawProgress {
    #[serde(default)]
    current: u64,
    #[serde(default)]
    total: u64,
}

impl From<RawProgress> for JobProgress {
    fn from(raw: RawProgress) -> Self {
        JobProgress::new(raw.current, raw.total)
    }
}

impl JobProgress {
    /// Build a progress value, normalising `total >= 1` and `current <= total`
    pub fn new(current: u64, total: u64) -> Self {
        let total = total.max(1);
        Self {
            current: current.min(total),
            total,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }

    /// Completion ratio in [0, 1]
    pub fn fraction(&self) -> f64 {
        self.current as f64 / self.total as f64
    }
}

impl Default for JobProgress {
    fn default() -> Self {
        Self { current: 0, total: 1 }
    }
}

/// Handle for a match run. The service tracks progress per session, so
/// the handle is mostly informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Full result set of a match run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResults {
    #[serde(default)]
    pub ambiguous: Vec<MatchCandidate>,
    #[serde(default, rename = "results")]
    pub confident: Vec<MatchCandidate>,
}

impl MatchResults {
    pub fn total(&self) -> usize {
        self.ambiguous.len() + self.confident.len()
    }
}

/// Acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}
