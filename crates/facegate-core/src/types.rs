use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub type UserId = i64;
pub type PhotoId = i64;

/// A registered user as returned by `GET /api/users`.
///
/// Some backend versions echo a stored `password` field; it is
/// not part of this type and is dropped on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Payload for creating or updating a user.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Sent only when supplied. Never rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &Redacted(&self.password))
            .finish()
    }
}

/// Debug helper that hides a secret value in log output.
pub struct Redacted<'a>(pub &'a Option<String>);

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("Some(<redacted>)"),
            None => f.write_str("None"),
        }
    }
}

/// A stored photo belonging to exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub filename: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub created_at: String,
}

/// Response of `POST /api/photos/{userId}/upload/multiple`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiUploadReport {
    #[serde(default)]
    pub files: Vec<Photo>,
    #[serde(default)]
    pub total: Option<usize>,
    /// Per-file failures. Shape varies between backend versions.
    #[serde(default)]
    pub errors: Option<Vec<Value>>,
}

impl MultiUploadReport {
    pub fn failed(&self) -> usize {
        self.errors.as_ref().map_or(0, Vec::len)
    }
}

/// A class label or enrolled user reference; the backend emits both
/// integer ids and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Id(i64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Id(id) => write!(f, "{id}"),
            Label::Name(name) => f.write_str(name),
        }
    }
}

/// Body of `POST /api/training/start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub epochs: u32,
    pub batch_size: u32,
    pub validation_split: f32,
    pub continue_training: bool,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            validation_split: 0.2,
            continue_training: false,
        }
    }
}

/// Statistics returned when a training run completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStats {
    pub num_data: Option<u64>,
    pub num_classes: Option<u64>,
    pub class_labels: Vec<Label>,
    pub test_accuracy: Option<f64>,
    pub test_loss: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub training_time_minutes: Option<f64>,
    pub epochs_trained: Option<u32>,
    pub model_path: Option<String>,
    pub timestamp: Option<String>,
}

/// Metrics persisted next to a trained model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyMetrics {
    pub test_accuracy: Option<f64>,
    pub test_loss: Option<f64>,
    pub training_accuracy: Option<f64>,
    pub training_loss: Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub validation_loss: Option<f64>,
    pub epochs_trained: Option<u32>,
    pub best_epoch: Option<i64>,
    pub model_architecture: Option<String>,
    pub timestamp: Option<String>,
}

/// Response of `GET /api/training/status` (not wrapped in `data`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStatus {
    pub message: Option<String>,
    pub model_available: bool,
    pub accuracy_metrics: Option<AccuracyMetrics>,
    pub num_classes: Option<u64>,
    pub class_labels: Vec<Label>,
}

/// Response data of `GET /api/face/model-info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub loaded: bool,
    pub num_users: u64,
    pub total_faces: u64,
    pub total_images: Option<u64>,
    pub embedding_dim: Option<u32>,
    pub model: Option<String>,
    pub training_date: Option<String>,
    pub users: Vec<Label>,
    pub error: Option<String>,
}

/// One ranked candidate of a 1:N prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub user_id: UserId,
    pub name: String,
    /// 0–100.
    pub confidence: f64,
    #[serde(default)]
    pub cosine_similarity: Option<f64>,
}

/// Result of `POST /api/face/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub confidence: f64,
    #[serde(default)]
    pub cosine_similarity: Option<f64>,
    #[serde(default)]
    pub all_predictions: Vec<Candidate>,
    #[serde(default)]
    pub method: Option<String>,
}

impl PredictionResult {
    /// Ranked candidates in server order, the identified user first.
    ///
    /// Older backends omit `all_predictions`; the identified user alone is
    /// returned in that case.
    pub fn ranked(&self) -> Vec<Candidate> {
        if self.all_predictions.is_empty() {
            return vec![Candidate {
                user_id: self.user_id,
                name: self.name.clone(),
                confidence: self.confidence,
                cosine_similarity: self.cosine_similarity,
            }];
        }
        self.all_predictions.clone()
    }
}

/// An issued authentication token with the identity it was issued for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSession {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub token: Uuid,
    pub confidence: f64,
    pub expires_at: String,
}

/// Identity behind a still-valid token (`POST /api/auth/verify`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub expires_at: String,
}

/// One active token of a user (`GET /api/auth/tokens/{userId}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveToken {
    pub token: Uuid,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub expires_at: String,
}

/// Outcome of a 1:1 face verification.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The face belongs to the claimed user and a token was issued.
    Matched(FaceSession),
    /// The detected face belongs to someone else (or nobody known).
    Mismatched {
        claimed_user_id: Option<UserId>,
        predicted_user_id: Option<UserId>,
        confidence: Option<f64>,
    },
    /// The face matched but not with enough certainty.
    LowConfidence {
        confidence: f64,
        required_confidence: f64,
    },
}

impl VerificationOutcome {
    /// Classify the `data` object of a verification response.
    ///
    /// `match: false` always selects the mismatch branch. Otherwise a
    /// `required_confidence` field selects the low-confidence branch,
    /// whether or not `match` is present. Anything else must decode as an
    /// issued session. Returns `None` for payloads that fit no branch.
    pub fn classify(data: &Value) -> Option<Self> {
        let confidence = data.get("confidence").and_then(Value::as_f64);

        if data.get("match").and_then(Value::as_bool) == Some(false) {
            return Some(VerificationOutcome::Mismatched {
                claimed_user_id: data.get("claimed_user_id").and_then(Value::as_i64),
                predicted_user_id: data.get("predicted_user_id").and_then(Value::as_i64),
                confidence,
            });
        }

        if let Some(required) = data.get("required_confidence").and_then(Value::as_f64) {
            return Some(VerificationOutcome::LowConfidence {
                confidence: confidence?,
                required_confidence: required,
            });
        }

        serde_json::from_value::<FaceSession>(data.clone())
            .ok()
            .map(VerificationOutcome::Matched)
    }

    pub fn is_match(&self) -> bool {
        matches!(self, VerificationOutcome::Matched(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_ignores_echoed_password() {
        let user: User = serde_json::from_value(json!({
            "id": 3, "name": "Ana", "email": "ana@example.com", "password": "hunter2"
        }))
        .unwrap();
        assert_eq!(user.name, "Ana");
        let back = serde_json::to_value(&user).unwrap();
        assert!(back.get("password").is_none());
    }

    #[test]
    fn test_new_user_omits_missing_password() {
        let body = serde_json::to_value(NewUser {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: None,
        })
        .unwrap();
        assert_eq!(body, json!({"name": "Ana", "email": "ana@example.com"}));
    }

    #[test]
    fn test_redacted_debug() {
        let pw = Some("secret".to_string());
        assert_eq!(format!("{:?}", Redacted(&pw)), "Some(<redacted>)");
    }

    #[test]
    fn test_labels_accept_ints_and_strings() {
        let stats: TrainingStats = serde_json::from_value(json!({
            "class_labels": [1, "7", 12],
            "test_accuracy": 0.93
        }))
        .unwrap();
        let shown: Vec<String> = stats.class_labels.iter().map(ToString::to_string).collect();
        assert_eq!(shown, vec!["1", "7", "12"]);
        assert_eq!(stats.num_data, None);
    }

    #[test]
    fn test_classify_mismatch() {
        let outcome = VerificationOutcome::classify(&json!({
            "match": false, "predicted_user_id": 9, "claimed_user_id": 4, "confidence": 88.1
        }))
        .unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome::Mismatched {
                claimed_user_id: Some(4),
                predicted_user_id: Some(9),
                confidence: Some(88.1),
            }
        );
    }

    #[test]
    fn test_classify_low_confidence_without_match_field() {
        let outcome = VerificationOutcome::classify(&json!({
            "confidence": 55.0, "required_confidence": 70.0
        }))
        .unwrap();
        assert_eq!(
            outcome,
            VerificationOutcome::LowConfidence {
                confidence: 55.0,
                required_confidence: 70.0
            }
        );
    }

    #[test]
    fn test_classify_low_confidence_with_match_true() {
        let outcome = VerificationOutcome::classify(&json!({
            "match": true, "confidence": 61.2, "required_confidence": 70.0
        }))
        .unwrap();
        assert!(matches!(outcome, VerificationOutcome::LowConfidence { .. }));
    }

    #[test]
    fn test_classify_matched() {
        let outcome = VerificationOutcome::classify(&json!({
            "match": true,
            "user_id": 4,
            "name": "Ana",
            "email": "ana@example.com",
            "token": "550e8400-e29b-41d4-a716-446655440000",
            "confidence": 97.5,
            "expires_at": "2026-10-20T10:00:00"
        }))
        .unwrap();
        assert!(outcome.is_match());
    }

    #[test]
    fn test_classify_unknown_payload() {
        assert!(VerificationOutcome::classify(&json!({"match": true})).is_none());
    }

    #[test]
    fn test_ranked_falls_back_to_identified_user() {
        let result = PredictionResult {
            user_id: 2,
            name: "Bo".into(),
            email: String::new(),
            confidence: 91.0,
            cosine_similarity: None,
            all_predictions: vec![],
            method: None,
        };
        let ranked = result.ranked();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].user_id, 2);
    }
}
