//! 実行サマリ
//!
//! カタログごとに `<output>.summary.json` を書き、端末に集計と警告を表示する。

use crate::error::Result;
use crate::pipeline::SliceOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use star_sed_common::{ExtinctionMode, MatchOptions, Population, RunStatistics};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// サマリファイルの内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub population: Population,
    pub extinction_mode: ExtinctionMode,
    pub extinction_model: String,
    pub max_distance: f64,
    pub k: usize,
    /// 使用した索引のライブラリ指紋
    pub library_fingerprint: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub statistics: RunStatistics,
}

/// サマリに共通の実行条件
#[derive(Debug, Clone)]
pub struct RunContext {
    pub population: Population,
    pub extinction_mode: ExtinctionMode,
    pub extinction_model: String,
    pub options: MatchOptions,
    pub library_fingerprint: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(context: &RunContext, outcome: &SliceOutcome) -> Self {
        Self {
            input: outcome.input.clone(),
            output: outcome.output.clone(),
            population: context.population,
            extinction_mode: context.extinction_mode,
            extinction_model: context.extinction_model.clone(),
            max_distance: context.options.max_distance,
            k: context.options.k,
            library_fingerprint: context.library_fingerprint.clone(),
            started_at: context.started_at,
            finished_at: Utc::now(),
            statistics: outcome.stats.clone(),
        }
    }

    /// `<output>.summary.json`
    pub fn path_for(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(".summary.json");
        PathBuf::from(name)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path_for(&self.output);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(path)
    }
}

/// 全スライスの統計を合算
pub fn total_statistics(outcomes: &[SliceOutcome]) -> RunStatistics {
    let mut total = RunStatistics::default();
    for outcome in outcomes {
        total.merge(&outcome.stats);
    }
    total
}

/// 集計と警告を表示
pub fn print_statistics(stats: &RunStatistics) {
    println!("集計:");
    for line in stats.summary_lines() {
        println!("  {}", line);
    }
    if stats.placeholders_written > 0 {
        println!("  placeholders:        {}", stats.placeholders_written);
    }

    // ログには開始時に1回出ているので端末表示のみ
    for warning in stats.warnings() {
        println!("⚠ {}", warning);
    }
}
