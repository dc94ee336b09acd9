//! SED照合モジュール
//!
//! ## 処理フロー
//! 1. ルーターから母集団を取得（実行単位で固定）
//! 2. 入力値の検証（非有限な等級・座標はスキップ）
//! 3. 減光を決定（入力値 / モデル計算 / 0）
//! 4. 減光補正後の色ベクトルで索引を検索
//! 5. 最大距離以内に候補がなければ no-candidate

use crate::error::{Error, Result};
use crate::extinction::{ExtinctionMode, ExtinctionPolicy};
use crate::index::SpectralIndex;
use crate::population::{Population, PopulationRouter};
use crate::types::{MatchResult, MatchStatus, StarRecord};
use serde::{Deserialize, Serialize};

/// 照合オプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// 採用する最大の重み付き色距離 [mag]
    pub max_distance: f64,
    /// 索引から取得する候補数
    pub k: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_distance: 0.5,
            k: 1,
        }
    }
}

impl MatchOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(Error::Config(format!(
                "max_distance must be positive, got {}",
                self.max_distance
            )));
        }
        if self.k == 0 {
            return Err(Error::Config("k must be at least 1".into()));
        }
        Ok(())
    }
}

/// SEDマッチャー
///
/// 索引・ルーター・減光ポリシーを借用するだけで状態を持たないため、
/// 複数スレッドから同時に使える。
#[derive(Debug, Clone)]
pub struct SedMatcher<'a> {
    index: &'a SpectralIndex,
    router: &'a PopulationRouter,
    extinction: &'a ExtinctionPolicy,
    options: MatchOptions,
}

impl<'a> SedMatcher<'a> {
    pub fn new(
        index: &'a SpectralIndex,
        router: &'a PopulationRouter,
        extinction: &'a ExtinctionPolicy,
        options: MatchOptions,
    ) -> Self {
        Self {
            index,
            router,
            extinction,
            options,
        }
    }

    pub fn population(&self) -> Population {
        self.router.population()
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    pub fn extinction_mode(&self) -> ExtinctionMode {
        self.extinction.mode()
    }

    pub fn extinction_disabled(&self) -> bool {
        self.extinction.is_disabled()
    }

    /// 母集団未指定で DEFAULT になった実行か
    pub fn population_defaulted(&self) -> bool {
        self.router.is_implicit_default()
    }

    /// 1レコードを照合する
    pub fn match_record(&self, record: StarRecord) -> MatchResult<'a> {
        let population = self.router.classify(&record);

        if let Err(e) = self.validate(&record, population) {
            return MatchResult::invalid(Some(record.id), population, e.to_string());
        }

        let extinction = self.extinction.resolve(&record);
        let corrected = record.observed_colors().dereddened(extinction.a_v);

        let best = self
            .index
            .query(&corrected, population, self.options.k)
            .into_iter()
            .next();

        let (status, template, distance, reason) = match best {
            Some(c) if c.distance <= self.options.max_distance => {
                (MatchStatus::Matched, Some(c.template), Some(c.distance), None)
            }
            Some(c) => (
                MatchStatus::NoCandidate,
                None,
                Some(c.distance),
                Some(format!(
                    "nearest template {} at distance {:.4} exceeds {}",
                    c.template.id, c.distance, self.options.max_distance
                )),
            ),
            None => (
                MatchStatus::NoCandidate,
                None,
                None,
                Some(format!("no templates for population {}", population)),
            ),
        };

        MatchResult {
            id: Some(record.id),
            record: Some(record),
            population,
            status,
            template,
            distance,
            extinction,
            reason,
        }
    }

    /// 索引に問い合わせる前の入力検証
    fn validate(&self, record: &StarRecord, population: Population) -> Result<()> {
        if !record.position.is_valid() {
            return Err(Error::InvalidRecord(format!(
                "invalid position ra={} dec={}",
                record.position.ra_deg, record.position.dec_deg
            )));
        }

        let bad = record.photometry.non_finite_bands(&population.required_bands());
        if !bad.is_empty() {
            let names: Vec<&str> = bad.iter().map(|b| b.name()).collect();
            return Err(Error::InvalidRecord(format!(
                "non-finite magnitude in band(s) {}",
                names.join(",")
            )));
        }

        if self.extinction.mode() == ExtinctionMode::UseSupplied {
            if let Some(av) = record.av {
                if !av.is_finite() || av < 0.0 {
                    return Err(Error::InvalidRecord(format!("invalid supplied A_V {}", av)));
                }
            }
        }

        Ok(())
    }
}
