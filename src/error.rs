use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarSedError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("母集団が指定されていません。`--population default|bhb|rrly|wd` で指定してください")]
    MissingPopulation,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("テンプレートライブラリが不正: {0}")]
    InvalidLibrary(String),

    #[error("索引ファイルのバージョンが一致しません（ファイル: {found}, 対応: {expected}）。`star-sed build-index` で再構築してください")]
    IndexVersion { found: u32, expected: u32 },

    #[error("索引がライブラリと一致しません: {0}")]
    StaleIndex(String),

    #[error("ダストマップ読み込みエラー: {0}")]
    DustMap(String),

    #[error("入力カタログ読み込みエラー: {0}")]
    InputRead(String),

    #[error("出力書き込みエラー: {0}")]
    OutputWrite(String),

    #[error("入力カタログが見つかりません: {0}")]
    NoInputFound(String),

    #[error("CSV解析エラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] star_sed_common::Error),
}

pub type Result<T> = std::result::Result<T, StarSedError>;
