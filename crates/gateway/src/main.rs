//! # CDP SQL Shim Gateway
//!
//! 長期のAPI鍵を保持し、リクエストごとに短命の署名付きトークンを発行して
//! リモートクエリAPIへ中継するHTTPサーバー。
//!
//! ## 役割
//! - 呼び出し元のSQLリクエストの検証
//! - API鍵によるBearerトークンの発行（ES256 / EdDSA）
//! - リモートクエリAPIへの中継とレスポンスの正規化
//! - CORSヘッダの付与
//!
//! ## API エンドポイント
//! - `POST /api/query` — クエリ中継（ルートは `SHIM_ROUTE` で変更可）
//! - `OPTIONS /api/query` — プリフライト

mod config;
mod cors;
mod endpoints;
mod error;
mod relay;
mod signer;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{ShimConfig, ShimState, ENV_KEY_ID, ENV_KEY_SECRET};

/// 共有状態からルーターを構築する。
fn build_router(state: Arc<ShimState>) -> axum::Router {
    let route = state.config.route.clone();
    axum::Router::new()
        .route(&route, axum::routing::any(endpoints::handle_query))
        .layer(axum::middleware::map_response(cors::apply_cors_headers))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ShimConfig::from_env()?;

    match &config.credentials {
        Some(credentials) => tracing::info!(
            kid = %credentials.key_id,
            alg = %config.scheme,
            "API鍵を読み込みました"
        ),
        None => tracing::warn!(
            "{ENV_KEY_ID} または {ENV_KEY_SECRET} が未設定です。クエリは設定エラーになります"
        ),
    }
    if config.access_token.is_some() {
        tracing::info!("受信リクエストにアクセストークンを要求します");
    }

    let addr = config.listen_addr.clone();
    tracing::info!(
        route = %config.route,
        upstream = %config.upstream_url,
        timeout_secs = config.upstream_timeout.as_secs(),
        "Shimを {} で起動します",
        addr
    );

    let state = Arc::new(ShimState::from_config(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
