//! # POST /api/query
//!
//! 呼び出し元のSQLを受け取り、発行したトークンを付けてリモートクエリAPIに中継する。
//!
//! 検証順序:
//! 1. OPTIONS → 204（署名・転送なし）
//! 2. POST以外 → 405
//! 3. 受信アクセストークン（設定時のみ） → 401
//! 4. 本文のJSON・`sql` → 400
//! 5. API鍵の設定 → 500
//!
//! 署名はこれら全てを通過した後にだけ行う。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use cdp_shim_types::{OutboundQuery, QueryRequest};
use constant_time_eq::constant_time_eq;
use tracing::Instrument;

use crate::config::{Secret, ShimState};
use crate::error::ShimError;
use crate::relay::relay_query;

/// リモートAPIに対して使うメソッド（トークンのスコープにも入る）
const UPSTREAM_METHOD: &str = "POST";

/// 受信ルートのハンドラ。全メソッドをここで受けて振り分ける。
pub async fn handle_query(
    State(state): State<Arc<ShimState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("query", %request_id, %method);

    async move {
        match forward(&state, &method, &headers, &body).await {
            Ok(response) => response,
            Err(e) => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(status = status.as_u16(), "リクエスト失敗: {e}");
                } else {
                    tracing::warn!(status = status.as_u16(), "リクエスト拒否: {e}");
                }
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// リクエストを検証し、トークンを発行して中継する。
async fn forward(
    state: &ShimState,
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ShimError> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if method != Method::POST {
        return Err(ShimError::MethodNotAllowed(method.to_string()));
    }

    check_access_token(state.config.access_token.as_ref(), headers)?;

    let query = parse_query(body)?;

    let minter = state.minter.as_deref().ok_or_else(|| {
        ShimError::Configuration("API鍵が設定されていません".to_string())
    })?;
    let token = minter.mint(UPSTREAM_METHOD, &state.config.token_target())?;

    tracing::info!(upstream = %state.config.upstream_url, "クエリを中継");
    relay_query(state, &token, &query).await
}

/// `SHIM_ACCESS_TOKEN` が設定されている場合のみ、受信Bearerトークンを照合する。
fn check_access_token(expected: Option<&Secret>, headers: &HeaderMap) -> Result<(), ShimError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.expose().as_bytes()) => {
            Ok(())
        }
        _ => Err(ShimError::Unauthorized),
    }
}

/// 本文をパースし、送信用クエリを組み立てる。空の本文は `{}` と同じ扱い。
fn parse_query(body: &[u8]) -> Result<OutboundQuery, ShimError> {
    let request: QueryRequest = if body.iter().all(u8::is_ascii_whitespace) {
        QueryRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ShimError::BadRequest(format!("JSONのパースに失敗: {e}")))?
    };

    OutboundQuery::from_request(&request)
        .ok_or_else(|| ShimError::BadRequest("sql フィールドが必要です".to_string()))
}
