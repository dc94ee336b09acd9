//! 索引ファイル
//!
//! 構築済みの SpectralIndex を k-d 木ごと保存し、再構築なしで読み込む。
//! ライブラリCSVの SHA-256 を記録して、ライブラリ更新後の古い索引を検出する。

use crate::catalog::reader::{is_gzip, open_text};
use crate::error::{Result, StarSedError};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use star_sed_common::{Population, PopulationRule, SpectralIndex};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// 索引ファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    /// バージョン（互換性チェック用）
    pub version: u32,
    pub built_at: DateTime<Utc>,
    /// ライブラリCSVの SHA-256（16進）
    pub library_fingerprint: String,
    pub template_count: usize,
    pub index: SpectralIndex,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl IndexFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(index: SpectralIndex, library_fingerprint: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            built_at: Utc::now(),
            library_fingerprint,
            template_count: index.len(),
            index,
        }
    }

    /// 索引ファイルを読み込み
    pub fn load(path: &Path) -> Result<Self> {
        // 先にバージョンだけ確認
        let header: VersionHeader = serde_json::from_reader(open_text(path)?)?;
        if header.version != Self::CURRENT_VERSION {
            return Err(StarSedError::IndexVersion {
                found: header.version,
                expected: Self::CURRENT_VERSION,
            });
        }

        let file: IndexFile = serde_json::from_reader(open_text(path)?)?;
        if file.template_count != file.index.len() {
            return Err(StarSedError::StaleIndex(format!(
                "テンプレート数が一致しません（記録: {}, 実数: {}）",
                file.template_count,
                file.index.len()
            )));
        }
        file.index.validate()?;
        Ok(file)
    }

    /// 索引ファイルを保存（`.gz` なら gzip）
    ///
    /// 一時ファイルに書いてから改名する。
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = tmp_path_for(path);
        let writer = BufWriter::new(File::create(&tmp_path)?);
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?.flush()?;
        } else {
            let mut writer = writer;
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }

        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// ライブラリが索引構築時から変わっているか
    pub fn is_stale(&self, library: &Path) -> Result<bool> {
        Ok(compute_file_fingerprint(library)? != self.library_fingerprint)
    }

    /// 古い索引ならエラー
    pub fn verify(&self, library: &Path) -> Result<()> {
        if self.is_stale(library)? {
            return Err(StarSedError::StaleIndex(format!(
                "{} は索引構築後に変更されています。`star-sed build-index` で再構築してください",
                library.display()
            )));
        }
        Ok(())
    }

    /// 索引の照合ルールが設定と一致するか
    ///
    /// 重みを変えた設定で古い索引を使うと距離がずれるのでエラーにする。
    pub fn check_rules(&self, rules: &[PopulationRule]) -> Result<()> {
        for rule in rules {
            let indexed = self.index.rule(rule.population);
            if indexed != Some(rule) {
                return Err(StarSedError::StaleIndex(format!(
                    "母集団 {} の照合ルールが設定と異なります（索引: {:?}, 設定: {:?}）",
                    rule.population,
                    indexed.map(|r| &r.weights),
                    rule.weights
                )));
            }
        }
        Ok(())
    }

    /// 母集団ごとのテンプレート数
    pub fn counts(&self) -> Vec<(Population, usize)> {
        Population::ALL
            .iter()
            .map(|p| (*p, self.index.count_for(*p)))
            .collect()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// ファイルの SHA-256（16進）
pub fn compute_file_fingerprint(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(StarSedError::FileNotFound(path.display().to_string()));
    }

    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
