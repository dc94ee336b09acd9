//! 実行統計
//!
//! 1回の実行（パイプライン呼び出し）ごとに作り直すカウンタ。

use crate::extinction::ExtinctionSource;
use crate::types::{MatchResult, MatchStatus};
use serde::{Deserialize, Serialize};

/// 実行統計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// 読み込んだ星の数（不正行を含む）
    pub stars_read: u64,
    pub matched: u64,
    pub skipped_invalid: u64,
    pub no_candidate: u64,
    /// 入力の A_V を採用した数
    pub extinction_supplied: u64,
    /// モデルで計算した数
    pub extinction_recomputed: u64,
    /// 計算失敗で 0 を採用した数
    pub extinction_fallback: u64,
    /// プレースホルダ行の数
    pub placeholders_written: u64,
    /// 物理効果（減光）を無効化した実行か
    pub extinction_disabled: bool,
    /// 母集団未指定で DEFAULT を使った実行か
    pub population_defaulted: bool,
    /// 中断理由（正常終了なら None）
    #[serde(default)]
    pub aborted: Option<String>,
}

impl RunStatistics {
    pub fn new(extinction_disabled: bool, population_defaulted: bool) -> Self {
        Self {
            extinction_disabled,
            population_defaulted,
            ..Default::default()
        }
    }

    /// 照合結果を1件集計
    pub fn record(&mut self, result: &MatchResult<'_>) {
        self.stars_read += 1;
        match result.status {
            MatchStatus::Matched => self.matched += 1,
            MatchStatus::NoCandidate => self.no_candidate += 1,
            MatchStatus::SkippedInvalid => self.skipped_invalid += 1,
        }
        match result.extinction.source {
            ExtinctionSource::Supplied => self.extinction_supplied += 1,
            ExtinctionSource::Computed => self.extinction_recomputed += 1,
            ExtinctionSource::Fallback => self.extinction_fallback += 1,
            ExtinctionSource::Disabled | ExtinctionSource::NotResolved => {}
        }
    }

    /// 複数スライスの統計を合算
    pub fn merge(&mut self, other: &RunStatistics) {
        self.stars_read += other.stars_read;
        self.matched += other.matched;
        self.skipped_invalid += other.skipped_invalid;
        self.no_candidate += other.no_candidate;
        self.extinction_supplied += other.extinction_supplied;
        self.extinction_recomputed += other.extinction_recomputed;
        self.extinction_fallback += other.extinction_fallback;
        self.placeholders_written += other.placeholders_written;
        self.extinction_disabled |= other.extinction_disabled;
        self.population_defaulted |= other.population_defaulted;
        if self.aborted.is_none() {
            self.aborted = other.aborted.clone();
        }
    }

    /// 出力 + スキップ + 候補なし = 入力 が成り立つか
    pub fn is_consistent(&self) -> bool {
        self.matched + self.skipped_invalid + self.no_candidate == self.stars_read
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// 実行終了時に必ず表示する警告
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.extinction_disabled {
            warnings.push(
                "physical extinction was DISABLED for this run (A_V = 0 for every star)".to_string(),
            );
        }
        if self.population_defaulted {
            warnings.push(
                "population was not specified; DEFAULT (main-sequence/red-giant) was used".to_string(),
            );
        }
        if let Some(reason) = &self.aborted {
            warnings.push(format!("run aborted, output is partial: {}", reason));
        }
        warnings
    }

    /// 集計行（表示用）
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("read:                {}", self.stars_read),
            format!("matched:             {}", self.matched),
            format!("skipped-invalid:     {}", self.skipped_invalid),
            format!("no-candidate:        {}", self.no_candidate),
            format!("extinction supplied: {}", self.extinction_supplied),
            format!("extinction computed: {}", self.extinction_recomputed),
            format!("extinction fallback: {}", self.extinction_fallback),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extinction::AppliedExtinction;
    use crate::population::Population;

    fn result(status: MatchStatus, source: ExtinctionSource) -> MatchResult<'static> {
        let mut r = MatchResult::invalid(Some(1), Population::Default, "x");
        r.status = status;
        r.extinction = AppliedExtinction {
            a_v: 0.0,
            source,
            error: None,
        };
        r
    }

    #[test]
    fn test_record_counts() {
        let mut stats = RunStatistics::new(false, false);
        stats.record(&result(MatchStatus::Matched, ExtinctionSource::Computed));
        stats.record(&result(MatchStatus::Matched, ExtinctionSource::Fallback));
        stats.record(&result(MatchStatus::NoCandidate, ExtinctionSource::Supplied));
        stats.record(&result(MatchStatus::SkippedInvalid, ExtinctionSource::NotResolved));

        assert_eq!(stats.stars_read, 4);
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.no_candidate, 1);
        assert_eq!(stats.skipped_invalid, 1);
        assert_eq!(stats.extinction_recomputed, 1);
        assert_eq!(stats.extinction_fallback, 1);
        assert_eq!(stats.extinction_supplied, 1);
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_merge() {
        let mut a = RunStatistics::new(true, false);
        a.record(&result(MatchStatus::Matched, ExtinctionSource::Disabled));
        let mut b = RunStatistics::new(false, true);
        b.record(&result(MatchStatus::NoCandidate, ExtinctionSource::Disabled));
        b.aborted = Some("input error".into());

        a.merge(&b);
        assert_eq!(a.stars_read, 2);
        assert!(a.extinction_disabled);
        assert!(a.population_defaulted);
        assert!(a.is_aborted());
        assert!(a.is_consistent());
    }

    #[test]
    fn test_warnings() {
        assert!(RunStatistics::new(false, false).warnings().is_empty());
        let warnings = RunStatistics::new(true, true).warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("DISABLED"));
        assert!(warnings[1].contains("DEFAULT"));
    }
}
