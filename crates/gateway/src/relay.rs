//! # リモートクエリAPIへの中継
//!
//! 発行済みトークンを `Authorization: Bearer` に付けてクエリを転送し、
//! レスポンスを呼び出し元向けに変換する。

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use cdp_shim_types::{truncate_chars, OutboundQuery, PREVIEW_MAX_CHARS};

use crate::config::ShimState;
use crate::error::ShimError;

/// リモートクエリAPIにクエリを中継する。
///
/// 再試行はしない。接続失敗・タイムアウトはそのまま `ShimError::Upstream` になる。
pub async fn relay_query(
    state: &ShimState,
    token: &str,
    query: &OutboundQuery,
) -> Result<Response, ShimError> {
    let response = state
        .http_client
        .post(state.config.upstream_url.clone())
        .bearer_auth(token)
        .json(query)
        .send()
        .await
        .map_err(|e| ShimError::Upstream(format!("HTTP送信失敗: {e}")))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .map_err(|e| ShimError::Upstream(format!("レスポンス読み取り失敗: {e}")))?;

    tracing::info!(
        status = status.as_u16(),
        content_type = content_type.as_deref().unwrap_or("-"),
        bytes = body.len(),
        "リモートAPIが応答"
    );

    normalize_response(status, content_type, body)
}

/// Content-Typeが構造化データ（JSON）を示すか
fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("json")
}

/// JSONレスポンスはステータスと本文をそのまま返す。
/// それ以外は本文の先頭 `PREVIEW_MAX_CHARS` 文字をエラーエンベロープに包む。
pub(crate) fn normalize_response(
    status: StatusCode,
    content_type: Option<String>,
    body: Bytes,
) -> Result<Response, ShimError> {
    match content_type {
        Some(ct) if is_json_content_type(&ct) => {
            Ok((status, [(header::CONTENT_TYPE, ct)], Body::from(body)).into_response())
        }
        content_type => {
            let text = String::from_utf8_lossy(&body);
            Err(ShimError::UpstreamNonJson {
                status,
                content_type,
                preview: truncate_chars(&text, PREVIEW_MAX_CHARS),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_passthrough_is_verbatim() {
        let raw = br#"{"result":[{"n":1}],  "meta":{}}"#;
        let response = normalize_response(
            StatusCode::CREATED,
            Some("application/json; charset=utf-8".to_string()),
            Bytes::from_static(raw),
        )
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], &raw[..]);
    }

    #[test]
    fn test_problem_json_counts_as_json() {
        assert!(is_json_content_type("application/problem+json"));
        assert!(is_json_content_type("Application/JSON"));
        assert!(!is_json_content_type("text/html; charset=utf-8"));
    }

    #[test]
    fn test_html_preview_is_truncated_to_500_chars() {
        let html = format!("<html>{}}}", "x".repeat(2000));
        let err = normalize_response(
            StatusCode::BAD_GATEWAY,
            Some("text/html".to_string()),
            Bytes::from(html),
        )
        .unwrap_err();

        match err {
            ShimError::UpstreamNonJson {
                status, preview, ..
            } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(preview.chars().count(), 500);
                assert!(preview.starts_with("<html>"));
            }
            other => panic!("想定外のエラー: {other:?}"),
        }
    }

    #[test]
    fn test_missing_content_type_is_not_json() {
        let err = normalize_response(StatusCode::OK, None, Bytes::from_static(b"ok")).unwrap_err();
        assert!(matches!(
            err,
            ShimError::UpstreamNonJson { content_type: None, ref preview, .. } if preview == "ok"
        ));
    }
}
