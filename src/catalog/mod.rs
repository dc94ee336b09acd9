//! 入出力カタログ

pub mod reader;
pub mod writer;

pub use reader::{open_text, CatalogReader};
pub use writer::{part_path_for, CatalogWriter};

use std::path::{Path, PathBuf};

/// 出力カタログの拡張子
pub const CATALOG_SUFFIX: &str = ".catalog.gz";

/// 入力スライスに対応する出力パス
///
/// `output` がディレクトリ（または複数入力）のときは
/// `<output>/<入力名から拡張子を除いたもの>.catalog.gz`、それ以外は `output` そのもの。
pub fn output_path_for(input: &Path, output: &Path, as_directory: bool) -> PathBuf {
    if !as_directory && !output.is_dir() {
        return output.to_path_buf();
    }

    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".to_string());
    let stem = file_name
        .strip_suffix(".gz")
        .or_else(|| file_name.strip_suffix(".GZ"))
        .unwrap_or(&file_name);
    let stem = Path::new(stem)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| stem.to_string());

    output.join(format!("{}{}", stem, CATALOG_SUFFIX))
}
