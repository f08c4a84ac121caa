//! Request/response contract for hosts driving the engine
//!
//! Types are transport-agnostic; `ApiRequest`/`ApiReply` give a tagged JSON
//! envelope for hosts that speak JSON.

use crate::engine::{CheckpointEngine, EventOutcome};
use crate::strategy::{CheckpointStrategy, SessionEvent};
use crate::EngineError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use store::{CheckpointId, SessionId, StoreError};
use tracing::{debug, info_span, Instrument};

/// Identifies the session a request targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    pub session_id: SessionId,
    pub project_id: String,
    pub project_path: PathBuf,
}

impl SessionScope {
    pub fn new(
        session_id: impl Into<SessionId>,
        project_id: impl Into<String>,
        project_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            project_path: project_path.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCheckpointSettings {
    #[serde(flatten)]
    pub scope: SessionScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCheckpointSettings {
    #[serde(flatten)]
    pub scope: SessionScope,
    pub auto_checkpoint_enabled: bool,
    /// Wire name, validated by the engine
    pub checkpoint_strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupOldCheckpoints {
    #[serde(flatten)]
    pub scope: SessionScope,
    /// Signed so that negative targets reach validation instead of failing to parse
    pub keep_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCheckpointCount {
    #[serde(flatten)]
    pub scope: SessionScope,
}

/// Settings of a session together with its checkpoint count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSettingsResponse {
    pub auto_checkpoint_enabled: bool,
    pub checkpoint_strategy: CheckpointStrategy,
    #[serde(alias = "checkpoint_count")]
    pub total_checkpoints: usize,
}

/// What happened to a recorded session event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordEventResponse {
    Created { checkpoint_id: CheckpointId },
    Skipped,
    Dropped { reason: String },
}

/// Error as seen by API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable machine-readable kind
    pub kind: String,
    pub message: String,
}

impl ApiError {
    fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let kind = match &err {
            EngineError::InvalidStrategy(_) => "invalid_strategy",
            EngineError::InvalidRetentionTarget(_) => "invalid_retention_target",
            EngineError::StorageWrite(_) => "storage_write",
            EngineError::StorageDelete(_) => "storage_delete",
            EngineError::Cancelled => "cancelled",
            EngineError::Store(StoreError::InvalidSession(_)) => "invalid_session",
            EngineError::Config(_) | EngineError::Settings(_) | EngineError::Store(_) => "storage",
        };
        Self::new(kind, err.to_string())
    }
}

/// Tagged request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum ApiRequest {
    GetCheckpointSettings(GetCheckpointSettings),
    UpdateCheckpointSettings(UpdateCheckpointSettings),
    CleanupOldCheckpoints(CleanupOldCheckpoints),
    ListCheckpointCount(ListCheckpointCount),
}

/// Successful response payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Settings(CheckpointSettingsResponse),
    Removed { removed_count: usize },
    Count { total_checkpoints: usize },
    Updated,
}

/// Reply envelope: `{"ok": ...}` or `{"error": {"kind", "message"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiReply {
    Ok(ApiResponse),
    Error(ApiError),
}

impl From<Result<ApiResponse, ApiError>> for ApiReply {
    fn from(result: Result<ApiResponse, ApiError>) -> Self {
        match result {
            Ok(response) => Self::Ok(response),
            Err(err) => Self::Error(err),
        }
    }
}

/// Request handler over a shared engine
#[derive(Clone)]
pub struct CheckpointApi {
    engine: Arc<CheckpointEngine>,
}

impl CheckpointApi {
    pub fn new(engine: Arc<CheckpointEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CheckpointEngine> {
        &self.engine
    }

    pub async fn get_checkpoint_settings(
        &self,
        request: GetCheckpointSettings,
    ) -> Result<CheckpointSettingsResponse, ApiError> {
        let session = validated(&request.scope)?;
        let view = self
            .engine
            .get_settings(session)
            .instrument(span("get_checkpoint_settings", &request.scope))
            .await?;

        Ok(CheckpointSettingsResponse {
            auto_checkpoint_enabled: view.auto_checkpoint_enabled,
            checkpoint_strategy: view.checkpoint_strategy,
            total_checkpoints: view.total_checkpoints,
        })
    }

    pub fn update_checkpoint_settings(&self, request: UpdateCheckpointSettings) -> Result<(), ApiError> {
        let session = validated(&request.scope)?;
        let _span = span("update_checkpoint_settings", &request.scope).entered();
        self.engine.update_settings(
            session,
            request.auto_checkpoint_enabled,
            &request.checkpoint_strategy,
        )?;
        Ok(())
    }

    /// Returns the number of checkpoints actually removed
    pub async fn cleanup_old_checkpoints(&self, request: CleanupOldCheckpoints) -> Result<usize, ApiError> {
        let session = validated(&request.scope)?;
        let keep_count = usize::try_from(request.keep_count)
            .map_err(|_| EngineError::InvalidRetentionTarget(request.keep_count))?;

        let report = self
            .engine
            .cleanup(session, keep_count)
            .instrument(span("cleanup_old_checkpoints", &request.scope))
            .await?;
        Ok(report.removed_count())
    }

    pub async fn list_checkpoint_count(&self, request: ListCheckpointCount) -> Result<usize, ApiError> {
        let session = validated(&request.scope)?;
        let view = self
            .engine
            .get_settings(session)
            .instrument(span("list_checkpoint_count", &request.scope))
            .await?;
        Ok(view.total_checkpoints)
    }

    /// Feed a session event; `capture` runs only if a checkpoint is written
    pub async fn record_event<F>(
        &self,
        scope: &SessionScope,
        event: SessionEvent,
        capture: F,
    ) -> Result<RecordEventResponse, ApiError>
    where
        F: FnOnce() -> Bytes + Send,
    {
        let session = validated(scope)?;
        let outcome = self
            .engine
            .on_event(session, event, capture)
            .instrument(span("record_event", scope))
            .await?;

        Ok(match outcome {
            EventOutcome::Created(checkpoint) => RecordEventResponse::Created {
                checkpoint_id: checkpoint.id,
            },
            EventOutcome::Skipped => RecordEventResponse::Skipped,
            EventOutcome::Dropped { reason } => RecordEventResponse::Dropped { reason },
        })
    }

    /// Route a tagged request
    pub async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        match request {
            ApiRequest::GetCheckpointSettings(req) => {
                self.get_checkpoint_settings(req).await.map(ApiResponse::Settings)
            }
            ApiRequest::UpdateCheckpointSettings(req) => {
                self.update_checkpoint_settings(req).map(|()| ApiResponse::Updated)
            }
            ApiRequest::CleanupOldCheckpoints(req) => self
                .cleanup_old_checkpoints(req)
                .await
                .map(|removed_count| ApiResponse::Removed { removed_count }),
            ApiRequest::ListCheckpointCount(req) => self
                .list_checkpoint_count(req)
                .await
                .map(|total_checkpoints| ApiResponse::Count { total_checkpoints }),
        }
    }

    /// Handle one JSON request and produce a JSON reply
    pub async fn handle_json(&self, request: &str) -> String {
        let reply: ApiReply = match serde_json::from_str::<ApiRequest>(request) {
            Ok(request) => self.dispatch(request).await.into(),
            Err(err) => ApiReply::Error(ApiError::new("invalid_request", err.to_string())),
        };
        debug!(?reply, "API reply");
        serde_json::to_string(&reply).unwrap_or_else(|err| {
            format!(r#"{{"error":{{"kind":"storage","message":"{}"}}}}"#, err)
        })
    }
}

fn validated(scope: &SessionScope) -> Result<&SessionId, ApiError> {
    scope.session_id.validate().map_err(EngineError::from)?;
    Ok(&scope.session_id)
}

fn span(method: &'static str, scope: &SessionScope) -> tracing::Span {
    info_span!(
        "api",
        method,
        session = %scope.session_id,
        project = %scope.project_id
    )
}
