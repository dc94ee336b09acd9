//! 合成星カタログのSED照合ツール
//!
//! ファイル入出力を伴う部分（設定・ライブラリ・索引ファイル・ダストマップ・
//! カタログ読み書き・並列パイプライン）。照合アルゴリズム本体は star-sed-common。

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dust;
pub mod error;
pub mod library;
pub mod pipeline;
pub mod scanner;
pub mod summary;
