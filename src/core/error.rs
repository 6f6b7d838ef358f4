//! Error handling for video publishing
//!
//! This module provides the error taxonomy shared by adapters, the retry
//! policy, the chunked uploader and the orchestrator, using the thiserror
//! crate for ergonomic error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error category recorded in a platform's failure outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UnsupportedPlatform,
    StagingFailure,
    InitError,
    CommitError,
    TransferError,
    ResponseParseFailure,
    ConfigError,
    TaskAborted,
}

/// Main error type for video publishing operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    // Resolution errors
    #[error("[{platform}] 未対応のプラットフォームです")]
    UnsupportedPlatform { platform: String },

    // Staging errors
    #[error("動画のステージングに失敗しました: {message}")]
    StagingFailure { message: String },

    // Upload initialization errors
    #[error("[{platform}] アップロードの初期化に失敗しました: {message}")]
    InitError { platform: String, message: String },

    // Commit errors
    #[error("[{platform}] 公開処理に失敗しました ({attempts}回試行): {message}")]
    CommitError {
        platform: String,
        message: String,
        status: Option<u16>,
        attempts: u32,
        exhausted: bool,
    },

    // Transfer errors
    #[error("[{platform}] チャンク{chunk_index}の転送に失敗しました: {message}")]
    TransferError {
        platform: String,
        chunk_index: usize,
        status: Option<u16>,
        message: String,
    },

    // Response errors
    #[error("[{platform}] レスポンスの解析に失敗しました: {message}")]
    ResponseParseFailure { platform: String, message: String },

    // Configuration errors
    #[error("設定エラー: {0}")]
    ConfigError(String),

    // Task errors
    #[error("[{platform}] 公開タスクが中断されました: {message}")]
    TaskAborted { platform: String, message: String },
}

impl PublishError {
    /// Get the platform name associated with this error, if any
    pub fn platform(&self) -> Option<&str> {
        match self {
            Self::UnsupportedPlatform { platform }
            | Self::InitError { platform, .. }
            | Self::CommitError { platform, .. }
            | Self::TransferError { platform, .. }
            | Self::ResponseParseFailure { platform, .. }
            | Self::TaskAborted { platform, .. } => Some(platform),
            Self::StagingFailure { .. } | Self::ConfigError(_) => None,
        }
    }

    /// Get the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            Self::StagingFailure { .. } => ErrorKind::StagingFailure,
            Self::InitError { .. } => ErrorKind::InitError,
            Self::CommitError { .. } => ErrorKind::CommitError,
            Self::TransferError { .. } => ErrorKind::TransferError,
            Self::ResponseParseFailure { .. } => ErrorKind::ResponseParseFailure,
            Self::ConfigError(_) => ErrorKind::ConfigError,
            Self::TaskAborted { .. } => ErrorKind::TaskAborted,
        }
    }

    /// Number of network attempts made before this error was surfaced
    ///
    /// Only commit errors can span several attempts. A platform that was
    /// never resolved reports zero.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::CommitError { attempts, .. } => *attempts,
            Self::UnsupportedPlatform { .. } | Self::ConfigError(_) => 0,
            _ => 1,
        }
    }

    /// Check if the caller may usefully retry the same request unchanged
    ///
    /// Transient "not ready" conditions are absorbed by the retry policy before
    /// an error is surfaced, so everything that reaches the caller is terminal
    /// for this request. Exhausted commits are the exception: the destination
    /// was still processing and a later attempt can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CommitError { exhausted: true, .. })
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::UnsupportedPlatform { .. } => vec![
                "プラットフォーム名を確認してください",
                "設定ファイルでプラットフォームが有効になっているか確認してください",
            ],
            Self::StagingFailure { .. } => vec![
                "ステージング先の設定（cloudName, uploadPreset）を確認してください",
                "ネットワーク接続を確認してください",
            ],
            Self::InitError { .. } => vec![
                "アクセストークンの有効期限を確認してください",
                "動画のサイズと形式を確認してください",
            ],
            Self::CommitError {
                exhausted: true, ..
            } => vec![
                "プラットフォーム側の処理が完了していません",
                "しばらく待ってから失敗したプラットフォームのみ再試行してください",
            ],
            Self::CommitError { .. } => vec![
                "エラーメッセージを確認してください",
                "プラットフォームのステータスを確認してください",
            ],
            Self::TransferError { .. } => vec![
                "ネットワーク接続を確認してください",
                "アップロードURLの有効期限が切れていないか確認してください",
            ],
            Self::ResponseParseFailure { .. } => {
                vec!["APIのバージョンが変更されていないか確認してください"]
            }
            Self::ConfigError(_) => vec![
                ".video-publish.yaml を確認してください",
                "video-publisher check で設定を検証できます",
            ],
            Self::TaskAborted { .. } => {
                vec!["ログを確認して失敗したプラットフォームのみ再試行してください"]
            }
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform { .. } => "UNSUPPORTED_PLATFORM",
            Self::StagingFailure { .. } => "STAGING_FAILURE",
            Self::InitError { .. } => "INIT_ERROR",
            Self::CommitError { .. } => "COMMIT_ERROR",
            Self::TransferError { .. } => "TRANSFER_ERROR",
            Self::ResponseParseFailure { .. } => "RESPONSE_PARSE_FAILURE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::TaskAborted { .. } => "TASK_ABORTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_platform_error() {
        let error = PublishError::UnsupportedPlatform {
            platform: "myspace".to_string(),
        };

        assert_eq!(error.platform(), Some("myspace"));
        assert_eq!(error.kind(), ErrorKind::UnsupportedPlatform);
        assert_eq!(error.code(), "UNSUPPORTED_PLATFORM");
        assert_eq!(error.attempts(), 0);
        assert!(!error.is_retryable());
        assert!(!error.suggested_actions().is_empty());
    }

    #[test]
    fn test_staging_failure_has_no_platform() {
        let error = PublishError::StagingFailure {
            message: "connection refused".to_string(),
        };

        assert_eq!(error.platform(), None);
        assert_eq!(error.code(), "STAGING_FAILURE");
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_commit_error_records_attempts() {
        let error = PublishError::CommitError {
            platform: "instagram".to_string(),
            message: "Media ID is not available".to_string(),
            status: Some(400),
            attempts: 5,
            exhausted: true,
        };

        assert_eq!(error.attempts(), 5);
        assert!(error.is_retryable());
        assert_eq!(error.kind(), ErrorKind::CommitError);
        let actions = error.suggested_actions();
        assert!(actions.iter().any(|a| a.contains("再試行")));
    }

    #[test]
    fn test_permanent_commit_error_is_not_retryable() {
        let error = PublishError::CommitError {
            platform: "youtube".to_string(),
            message: "quotaExceeded".to_string(),
            status: Some(403),
            attempts: 1,
            exhausted: false,
        };

        assert!(!error.is_retryable());
        assert_eq!(error.attempts(), 1);
    }

    #[test]
    fn test_transfer_error_display() {
        let error = PublishError::TransferError {
            platform: "tiktok".to_string(),
            chunk_index: 1,
            status: Some(500),
            message: "HTTP 500".to_string(),
        };

        assert_eq!(error.code(), "TRANSFER_ERROR");
        assert_eq!(error.attempts(), 1);
        let display = error.to_string();
        assert!(display.contains("tiktok"));
        assert!(display.contains("チャンク1"));
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ResponseParseFailure).unwrap();
        assert_eq!(json, r#""RESPONSE_PARSE_FAILURE""#);

        let kind: ErrorKind = serde_json::from_str(r#""INIT_ERROR""#).unwrap();
        assert_eq!(kind, ErrorKind::InitError);
    }
}
