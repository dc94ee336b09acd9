//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// インデックス構築失敗（起動時に致命的）
    #[error("Index build error: {0}")]
    IndexBuild(String),

    /// 入力レコード不正（レコード単位で回復）
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// 減光計算失敗（レコード単位で回復、A_V=0 にフォールバック）
    #[error("Extinction computation error: {0}")]
    Extinction(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
