//! # Shim エラー型
//!
//! 全てのエラーは構造化JSON（`ErrorEnvelope`）として呼び出し元に返す。
//! 鍵素材はどのバリアントにも含めない。

use axum::http::StatusCode;
use axum::Json;
use cdp_shim_token::TokenError;
use cdp_shim_types::ErrorEnvelope;

use crate::config::{ENV_KEY_ID, ENV_KEY_SECRET};

/// Shimエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    /// POST / OPTIONS 以外のメソッド
    #[error("許可されていないメソッドです: {0}")]
    MethodNotAllowed(String),
    /// 不正なリクエスト（JSONパース失敗、sql欠落）
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 受信アクセストークンの不一致
    #[error("認証が必要です")]
    Unauthorized,
    /// API鍵などの設定不足
    #[error("サーバー設定エラー: {0}")]
    Configuration(String),
    /// 鍵素材のデコード失敗・署名失敗
    #[error(transparent)]
    Signing(#[from] TokenError),
    /// リモートAPIが非JSONレスポンスを返した
    #[error("リモートAPIが非JSONレスポンスを返しました (HTTP {status})")]
    UpstreamNonJson {
        /// リモートAPIのステータス
        status: StatusCode,
        /// リモートAPIのContent-Type
        content_type: Option<String>,
        /// 本文の先頭部分
        preview: String,
    },
    /// リモートAPIへの転送失敗（接続・タイムアウト・本文読み取り）
    #[error("リモートAPIへの転送に失敗: {0}")]
    Upstream(String),
}

impl ShimError {
    /// 呼び出し元に返すHTTPステータス
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShimError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ShimError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ShimError::Unauthorized => StatusCode::UNAUTHORIZED,
            ShimError::Configuration(_) | ShimError::Signing(_) | ShimError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ShimError::UpstreamNonJson { status, .. } => *status,
        }
    }

    fn envelope(&self) -> ErrorEnvelope {
        match self {
            ShimError::Configuration(_) => ErrorEnvelope {
                hint: Some(format!(
                    "{ENV_KEY_ID} と {ENV_KEY_SECRET} を環境変数に設定してください"
                )),
                ..ErrorEnvelope::new(self.to_string())
            },
            ShimError::Signing(e) => ErrorEnvelope {
                details: Some(e.to_string()),
                ..ErrorEnvelope::new("トークンの署名に失敗しました")
            },
            ShimError::UpstreamNonJson {
                status,
                content_type,
                preview,
            } => ErrorEnvelope {
                status: Some(status.as_u16()),
                content_type: content_type.clone(),
                preview: Some(preview.clone()),
                ..ErrorEnvelope::new("リモートAPIが非JSONレスポンスを返しました")
            },
            ShimError::Upstream(details) => ErrorEnvelope {
                details: Some(details.clone()),
                ..ErrorEnvelope::new("リモートAPIへの転送に失敗しました")
            },
            _ => ErrorEnvelope::new(self.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ShimError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}
