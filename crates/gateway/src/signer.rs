//! # トークン発行
//!
//! リモート呼び出しごとにBearerトークンを発行する。
//! ハンドラはトレイト経由で発行器を呼ぶため、テストでは呼び出し回数を計測する実装に差し替えられる。

use cdp_shim_token::{KeyScheme, TokenError};

use crate::config::Credentials;

/// Bearerトークン発行の抽象インターフェース。
pub trait TokenMinter: Send + Sync {
    /// `method` と `target`（`host/path`）にスコープを限定したトークンを発行する。
    fn mint(&self, method: &str, target: &str) -> Result<String, TokenError>;
}

/// 設定済みのAPI鍵で署名する発行器。
///
/// 鍵素材のデコードは発行のたびに行う。不正な鍵素材は起動失敗ではなく
/// リクエスト単位の署名エラーとして扱う。
pub struct CdpTokenMinter {
    credentials: Credentials,
    scheme: KeyScheme,
}

impl CdpTokenMinter {
    pub fn new(credentials: Credentials, scheme: KeyScheme) -> Self {
        Self {
            credentials,
            scheme,
        }
    }
}

impl TokenMinter for CdpTokenMinter {
    fn mint(&self, method: &str, target: &str) -> Result<String, TokenError> {
        tracing::debug!(
            kid = %self.credentials.key_id,
            alg = %self.scheme,
            %method,
            %target,
            "トークンを発行"
        );
        cdp_shim_token::sign(
            &self.credentials.key_id,
            self.credentials.key_material.expose(),
            self.scheme,
            method,
            target,
        )
    }
}
