//! # エンドポイントテスト用共通ヘルパー
//!
//! モックのリモートクエリAPIと、呼び出し回数を数えるトークン発行器。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cdp_shim_token::TokenError;

use crate::config::{ShimConfig, ShimState};
use crate::signer::TokenMinter;

/// 固定トークンを返し、呼び出し回数を記録する発行器。
pub struct CountingMinter {
    pub calls: Arc<AtomicUsize>,
    pub token: String,
}

impl CountingMinter {
    /// 発行器と、その呼び出し回数カウンタを返す。
    pub fn new(token: &str) -> (Box<dyn TokenMinter>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let minter = Self {
            calls: calls.clone(),
            token: token.to_string(),
        };
        (Box::new(minter), calls)
    }
}

impl TokenMinter for CountingMinter {
    fn mint(&self, _method: &str, _target: &str) -> Result<String, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token.clone())
    }
}

/// テスト用モックHTTPサーバーを起動し、ポート番号を返す。
pub async fn start_mock_upstream(app: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    port
}

/// 何も待ち受けていないポートを返す。
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// 環境変数の組からテスト用設定を構築する。
pub fn test_config(pairs: &[(&str, &str)]) -> ShimConfig {
    let vars: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ShimConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

/// `127.0.0.1:{port}` を転送先とするテスト用共有状態を構築する。
pub fn test_state(
    port: u16,
    minter: Option<Box<dyn TokenMinter>>,
    extra: &[(&str, &str)],
) -> Arc<ShimState> {
    let base_url = format!("http://127.0.0.1:{port}");
    let mut pairs = vec![("CDP_API_BASE_URL", base_url.as_str())];
    pairs.extend_from_slice(extra);

    let mut state = ShimState::from_config(test_config(&pairs)).unwrap();
    state.minter = minter;
    Arc::new(state)
}
