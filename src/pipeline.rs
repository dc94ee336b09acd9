//! 照合パイプライン
//!
//! 入力スライスをチャンク単位で読み込み、チャンク内を rayon で並列照合して
//! 入力順のまま1本の gzip カタログへ書き出す。索引・ルーター・減光モデルは
//! 読み取り専用で全スレッドから共有する。

use crate::catalog::{CatalogReader, CatalogWriter};
use crate::error::{Result, StarSedError};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use star_sed_common::{
    InputColumns, LineFormat, MatchResult, ParsedLine, RunStatistics, SedMatcher,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 実行中断フラグ（チャンクの境界で確認する）
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// パイプライン設定
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub columns: InputColumns,
    pub format: LineFormat,
    pub chunk_size: usize,
    pub write_header: bool,
    /// 0 なら rayon の既定
    pub threads: usize,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            columns: InputColumns::default(),
            format: LineFormat::default(),
            chunk_size: 10_000,
            write_header: true,
            threads: 0,
            show_progress: false,
        }
    }
}

/// 1スライスの処理結果
#[derive(Debug, Clone)]
pub struct SliceOutcome {
    pub input: PathBuf,
    /// 完了時は最終パス、中断時は `.part`
    pub output: PathBuf,
    pub stats: RunStatistics,
}

impl SliceOutcome {
    pub fn is_complete(&self) -> bool {
        !self.stats.is_aborted()
    }
}

pub struct Pipeline<'a> {
    matcher: SedMatcher<'a>,
    options: PipelineOptions,
    cancel: CancelToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(matcher: SedMatcher<'a>, options: PipelineOptions) -> Self {
        Self {
            matcher,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 新しい実行の統計
    fn new_stats(&self) -> RunStatistics {
        RunStatistics::new(
            self.matcher.extinction_disabled(),
            self.matcher.population_defaulted(),
        )
    }

    /// 複数スライスを順に処理（スライス内は並列）
    ///
    /// 中断したスライスがあればそこで止める。
    pub fn run(&self, slices: &[(PathBuf, PathBuf)]) -> Result<Vec<SliceOutcome>> {
        if self.options.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .build()
                .map_err(|e| StarSedError::Config(format!("スレッドプール作成失敗: {}", e)))?;
            pool.install(|| self.run_all(slices))
        } else {
            self.run_all(slices)
        }
    }

    fn run_all(&self, slices: &[(PathBuf, PathBuf)]) -> Result<Vec<SliceOutcome>> {
        let mut outcomes = Vec::with_capacity(slices.len());
        for (input, output) in slices {
            let outcome = self.run_slice(input, output)?;
            let complete = outcome.is_complete();
            outcomes.push(outcome);
            if !complete {
                break;
            }
        }
        Ok(outcomes)
    }

    /// 1スライスを照合して書き出す
    ///
    /// 入力の読み込み失敗・中断は `.part` を残して統計付きで返す。
    /// 出力の書き込み失敗は OutputWrite エラー。
    pub fn run_slice(&self, input: &Path, output: &Path) -> Result<SliceOutcome> {
        let mut reader = CatalogReader::open(input, self.options.columns.clone())?;
        let mut writer = CatalogWriter::create(output)?;
        let mut stats = self.new_stats();
        let format = &self.options.format;

        if self.options.write_header {
            for line in format.header_lines(self.matcher.population(), self.matcher.extinction_mode()) {
                writer.write_line(&line)?;
            }
        }

        let progress = self.progress_bar(input);

        loop {
            if self.cancel.is_cancelled() {
                stats.aborted = Some("cancelled".to_string());
                break;
            }

            let chunk = match reader.next_chunk(self.options.chunk_size) {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::error!("{}: {}", input.display(), e);
                    stats.aborted = Some(e.to_string());
                    break;
                }
            };
            if chunk.is_empty() {
                break;
            }

            // collect は入力順を保つ
            let results: Vec<MatchResult<'a>> = chunk
                .into_par_iter()
                .filter_map(|line| self.match_line(line))
                .collect();

            for result in &results {
                stats.record(result);
                if let Some(line) = format.emit(result) {
                    writer.write_line(&line)?;
                } else if let Some(line) = format.placeholder(result) {
                    writer.write_line(&line)?;
                    stats.placeholders_written += 1;
                }
            }
            progress.set_position(stats.stars_read);
        }

        progress.finish_and_clear();

        let output = if stats.is_aborted() {
            writer.abort()?
        } else {
            writer.finish()?
        };

        log::debug!(
            "{}: read={} matched={} skipped={} no_candidate={}",
            input.display(),
            stats.stars_read,
            stats.matched,
            stats.skipped_invalid,
            stats.no_candidate
        );

        Ok(SliceOutcome {
            input: input.to_path_buf(),
            output,
            stats,
        })
    }

    fn match_line(&self, line: ParsedLine) -> Option<MatchResult<'a>> {
        match line {
            ParsedLine::Record(record) => Some(self.matcher.match_record(record)),
            ParsedLine::Invalid(invalid) => Some(MatchResult::invalid(
                invalid.id,
                self.matcher.population(),
                invalid.reason,
            )),
            ParsedLine::Skip => None,
        }
    }

    fn progress_bar(&self, input: &Path) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {pos} stars ({elapsed})") {
            pb.set_style(style);
        }
        pb.set_message(
            input
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        pb.enable_steady_tick(Duration::from_millis(200));
        pb
    }
}
