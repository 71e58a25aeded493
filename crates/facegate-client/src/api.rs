//! Typed calls against the backend REST surface.
//!
//! Every call follows one contract: send, parse the JSON body whatever the
//! status, then either decode the payload (2xx) or fail with the server's
//! `message`. Nothing is retried and nothing times out.

use crate::transport::{ApiRequest, FilePart, Transport, TransportError};
use facegate_core::types::{
    ActiveToken, FaceSession, ModelInfo, MultiUploadReport, NewUser, Photo, PhotoId,
    PredictionResult, TokenInfo, TrainingParams, TrainingStats, TrainingStatus, User, UserId,
    VerificationOutcome,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] TransportError),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text shown next to the form that triggered the request.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(e) => format!("Error: {e}"),
            ApiError::Server { message, .. } => format!("❌ Error: {message}"),
            ApiError::Decode(detail) => format!("❌ Error: unexpected response ({detail})"),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A parsed response: status plus JSON body (`Null` when absent or not JSON).
struct Exchange {
    status: u16,
    success: bool,
    body: Value,
    parsed: bool,
}

impl Exchange {
    fn is_success(&self) -> bool {
        self.success
    }

    fn server_error(&self) -> ApiError {
        let message = self
            .body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", self.status));
        ApiError::Server {
            status: self.status,
            message,
        }
    }

    /// The body on 2xx, the server error otherwise.
    fn into_success(self) -> Result<Value, ApiError> {
        if !self.is_success() {
            return Err(self.server_error());
        }
        if !self.parsed {
            return Err(ApiError::Decode(format!(
                "status {} with a non-JSON body",
                self.status
            )));
        }
        Ok(self.body)
    }

    fn data(&self) -> Option<&Value> {
        self.body.get("data").filter(|d| !d.is_null())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn envelope_data(body: Value) -> Result<Value, ApiError> {
    match body {
        Value::Object(mut map) => map
            .remove("data")
            .ok_or_else(|| ApiError::Decode("response has no data field".into())),
        _ => Err(ApiError::Decode("response is not an object".into())),
    }
}

fn message_of(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub struct ApiClient<T> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn api_base(&self) -> &str {
        self.transport.api_base()
    }

    async fn exchange(&self, request: ApiRequest) -> Result<Exchange, ApiError> {
        let method = request.method;
        let path = request.path.clone();
        tracing::debug!(%method, path = %path, "sending request");

        let raw = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(%method, path = %path, error = %e, "request did not complete");
            e
        })?;

        let (body, parsed) = if raw.body.is_empty() {
            (Value::Null, false)
        } else {
            match serde_json::from_slice::<Value>(&raw.body) {
                Ok(v) => (v, true),
                Err(_) => (Value::Null, false),
            }
        };
        if !raw.is_success() {
            tracing::info!(%method, path = %path, status = raw.status, "server reported failure");
        }
        Ok(Exchange {
            status: raw.status,
            success: raw.is_success(),
            body,
            parsed,
        })
    }

    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.exchange(request).await?.into_success()
    }

    // ---- users ----

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        decode(self.call(ApiRequest::get("/users")).await?)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, ApiError> {
        decode(self.call(ApiRequest::get(format!("/users/{id}"))).await?)
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let body = serde_json::to_value(user).map_err(|e| ApiError::Decode(e.to_string()))?;
        decode(self.call(ApiRequest::post_json("/users", body)).await?)
    }

    pub async fn update_user(&self, id: UserId, user: &NewUser) -> Result<User, ApiError> {
        let body = serde_json::to_value(user).map_err(|e| ApiError::Decode(e.to_string()))?;
        decode(
            self.call(ApiRequest::put_json(format!("/users/{id}"), body))
                .await?,
        )
    }

    /// Delete a user and all their photos; returns the server message.
    pub async fn delete_user(&self, id: UserId) -> Result<String, ApiError> {
        let body = self
            .call(ApiRequest::delete(format!("/users/{id}")))
            .await?;
        Ok(message_of(&body))
    }

    // ---- photos ----

    pub async fn list_photos(&self, user_id: UserId) -> Result<Vec<Photo>, ApiError> {
        decode(
            self.call(ApiRequest::get(format!("/photos/{user_id}")))
                .await?,
        )
    }

    pub fn photo_view_url(&self, user_id: UserId, photo_id: PhotoId) -> String {
        facegate_core::render::photo_view_url(self.api_base(), user_id, photo_id)
    }

    /// Upload one photo; the part is sent as field `file`.
    pub async fn upload_photo(&self, user_id: UserId, file: FilePart) -> Result<Photo, ApiError> {
        let file = FilePart { field: "file".into(), ..file };
        decode(
            self.call(ApiRequest::post_multipart(
                format!("/photos/{user_id}/upload"),
                Vec::new(),
                vec![file],
            ))
            .await?,
        )
    }

    /// Upload several photos as repeated `files[]` fields.
    pub async fn upload_photos(
        &self,
        user_id: UserId,
        files: Vec<FilePart>,
    ) -> Result<MultiUploadReport, ApiError> {
        let files = files
            .into_iter()
            .map(|f| FilePart { field: "files[]".into(), ..f })
            .collect();
        decode(
            self.call(ApiRequest::post_multipart(
                format!("/photos/{user_id}/upload/multiple"),
                Vec::new(),
                files,
            ))
            .await?,
        )
    }

    pub async fn delete_photo(&self, user_id: UserId, photo_id: PhotoId) -> Result<String, ApiError> {
        let body = self
            .call(ApiRequest::delete(format!("/photos/{user_id}/{photo_id}")))
            .await?;
        Ok(message_of(&body))
    }

    // ---- training ----

    pub async fn start_training(&self, params: &TrainingParams) -> Result<TrainingStats, ApiError> {
        let body = serde_json::to_value(params).map_err(|e| ApiError::Decode(e.to_string()))?;
        let body = self
            .call(ApiRequest::post_json("/training/start", body))
            .await?;
        decode(envelope_data(body)?)
    }

    pub async fn training_status(&self) -> Result<TrainingStatus, ApiError> {
        decode(self.call(ApiRequest::get("/training/status")).await?)
    }

    // ---- face ----

    /// Model information. A not-loaded model is reported with a 404 that
    /// still carries the info object; that is returned as data.
    pub async fn model_info(&self) -> Result<ModelInfo, ApiError> {
        let ex = self.exchange(ApiRequest::get("/face/model-info")).await?;
        match ex.data() {
            Some(data) => decode(data.clone()),
            None => Err(if ex.is_success() {
                ApiError::Decode("response has no data field".into())
            } else {
                ex.server_error()
            }),
        }
    }

    /// 1:N identification of the face in `file` (sent as field `file`).
    pub async fn predict(&self, file: FilePart) -> Result<PredictionResult, ApiError> {
        let file = FilePart { field: "file".into(), ..file };
        let body = self
            .call(ApiRequest::post_multipart("/face/predict", Vec::new(), vec![file]))
            .await?;
        decode(envelope_data(body)?)
    }

    // ---- auth ----

    /// 1:1 verification of a claimed user.
    ///
    /// Mismatch (403) and low-confidence (401) responses carry a
    /// classifiable `data` object and are returned as outcomes.
    pub async fn verify_face(
        &self,
        user_id: UserId,
        file: FilePart,
    ) -> Result<VerificationOutcome, ApiError> {
        let file = FilePart { field: "file".into(), ..file };
        let ex = self
            .exchange(ApiRequest::post_multipart(
                "/auth/login-face-verify",
                vec![("user_id".into(), user_id.to_string())],
                vec![file],
            ))
            .await?;

        if let Some(outcome) = ex.data().and_then(VerificationOutcome::classify) {
            tracing::info!(user_id, matched = outcome.is_match(), "verification outcome");
            return Ok(outcome);
        }
        Err(if ex.is_success() {
            ApiError::Decode("verification response has no recognizable outcome".into())
        } else {
            ex.server_error()
        })
    }

    /// 1:N login: identify the face and issue a token.
    pub async fn login_face(&self, file: FilePart) -> Result<FaceSession, ApiError> {
        let file = FilePart { field: "file".into(), ..file };
        let body = self
            .call(ApiRequest::post_multipart("/auth/login-face", Vec::new(), vec![file]))
            .await?;
        decode(envelope_data(body)?)
    }

    pub async fn verify_token(&self, token: Uuid) -> Result<TokenInfo, ApiError> {
        let body = self
            .call(ApiRequest::post_json(
                "/auth/verify",
                json!({ "token": token.to_string() }),
            ))
            .await?;
        decode(envelope_data(body)?)
    }

    pub async fn logout(&self, token: Uuid) -> Result<String, ApiError> {
        let body = self
            .call(ApiRequest::post_json(
                "/auth/logout",
                json!({ "token": token.to_string() }),
            ))
            .await?;
        Ok(message_of(&body))
    }

    pub async fn active_tokens(&self, user_id: UserId) -> Result<Vec<ActiveToken>, ApiError> {
        let body = self
            .call(ApiRequest::get(format!("/auth/tokens/{user_id}")))
            .await?;
        decode(envelope_data(body)?)
    }
}
