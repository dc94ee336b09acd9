//! 母集団ルーティング
//!
//! 実行単位で指定された母集団（通常星/BHB/RR Lyrae/白色矮星）から、
//! 照合に使う色と重みを決める。母集団は星ごとに推定せず、
//! 1回の実行につき1種類とする。

use crate::error::{Error, Result};
use crate::photometry::{Band, Color, ColorVector};
use crate::types::StarRecord;
use serde::{Deserialize, Serialize};

/// 恒星の母集団
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Population {
    /// 主系列・赤色巨星
    #[serde(rename = "default")]
    Default,
    /// 青色水平分枝星
    #[serde(rename = "bhb")]
    BlueHorizontalBranch,
    #[serde(rename = "rrly")]
    RrLyrae,
    #[serde(rename = "wd")]
    WhiteDwarf,
}

impl Population {
    pub const ALL: [Population; 4] = [
        Population::Default,
        Population::BlueHorizontalBranch,
        Population::RrLyrae,
        Population::WhiteDwarf,
    ];

    /// CLI・CSVで使う識別子
    pub fn code(&self) -> &'static str {
        match self {
            Population::Default => "default",
            Population::BlueHorizontalBranch => "bhb",
            Population::RrLyrae => "rrly",
            Population::WhiteDwarf => "wd",
        }
    }

    /// 出力IDの `<id>.<subindex>` に使う天体種別コード
    pub fn object_type_id(&self) -> u32 {
        match self {
            Population::Default => 1,
            Population::BlueHorizontalBranch => 2,
            Population::RrLyrae => 3,
            Population::WhiteDwarf => 4,
        }
    }

    /// 照合に使う色
    pub fn active_colors(&self) -> &'static [Color] {
        match self {
            Population::Default => &[Color::UG, Color::GR, Color::RI, Color::IZ],
            Population::BlueHorizontalBranch => &[Color::UG, Color::GR],
            Population::RrLyrae => &[Color::GR, Color::RI],
            Population::WhiteDwarf => &[Color::UG, Color::GR, Color::RI],
        }
    }

    /// active_colors と同じ並びの既定の重み
    pub fn default_weights(&self) -> &'static [f64] {
        match self {
            // u-g は測光誤差が大きいので軽く扱う
            Population::Default => &[0.5, 1.0, 1.0, 1.0],
            Population::BlueHorizontalBranch => &[1.0, 1.0],
            Population::RrLyrae => &[1.0, 1.0],
            Population::WhiteDwarf => &[1.0, 1.0, 1.0],
        }
    }

    /// 照合に必要なバンド（magNorm 用の r を含む）
    pub fn required_bands(&self) -> Vec<Band> {
        let mut bands = vec![Band::R];
        for color in self.active_colors() {
            let (blue, red) = color.bands();
            for band in [blue, red] {
                if !bands.contains(&band) {
                    bands.push(band);
                }
            }
        }
        bands
    }
}

impl std::str::FromStr for Population {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "ms" | "main-sequence" => Ok(Population::Default),
            "bhb" | "blue-horizontal-branch" => Ok(Population::BlueHorizontalBranch),
            "rrly" | "rrlyrae" | "rr-lyrae" => Ok(Population::RrLyrae),
            "wd" | "white-dwarf" => Ok(Population::WhiteDwarf),
            _ => Err(format!(
                "Unknown population: {}. Use default, bhb, rrly, or wd",
                s
            )),
        }
    }
}

impl std::fmt::Display for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 母集団ごとの照合ルール（使用する色と重み付きユークリッド距離）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRule {
    pub population: Population,
    pub colors: Vec<Color>,
    pub weights: Vec<f64>,
}

impl PopulationRule {
    pub fn for_population(population: Population) -> Self {
        Self {
            population,
            colors: population.active_colors().to_vec(),
            weights: population.default_weights().to_vec(),
        }
    }

    /// 重みを差し替える
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.colors.len() {
            return Err(Error::Config(format!(
                "{}: expected {} weights, got {}",
                self.population,
                self.colors.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config(format!(
                "{}: weights must be finite and non-negative",
                self.population
            )));
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(Error::Config(format!(
                "{}: at least one weight must be positive",
                self.population
            )));
        }
        self.weights = weights;
        Ok(self)
    }

    pub fn dimensions(&self) -> usize {
        self.colors.len()
    }

    /// 重み付き空間へ射影する（各軸を sqrt(w) 倍）
    ///
    /// 射影後の通常のユークリッド距離が重み付き距離に等しくなる。
    pub fn project(&self, colors: &ColorVector) -> Vec<f64> {
        self.colors
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| colors.get(*c) * w.sqrt())
            .collect()
    }
}

/// 実行全体の母集団を決めるルーター
#[derive(Debug, Clone)]
pub struct PopulationRouter {
    population: Population,
    implicit_default: bool,
}

impl PopulationRouter {
    /// 母集団未指定なら DEFAULT を選び、警告を1回だけ出す
    pub fn new(selection: Option<Population>) -> Self {
        match selection {
            Some(population) => Self {
                population,
                implicit_default: false,
            },
            None => {
                log::warn!(
                    "population not specified; falling back to '{}' (main-sequence/red-giant) for the whole run",
                    Population::Default
                );
                Self {
                    population: Population::Default,
                    implicit_default: true,
                }
            }
        }
    }

    /// 母集団の明示指定を必須にする
    pub fn strict(selection: Option<Population>) -> Result<Self> {
        match selection {
            Some(population) => Ok(Self::new(Some(population))),
            None => Err(Error::Config(
                "population must be specified explicitly (default, bhb, rrly, wd)".into(),
            )),
        }
    }

    /// レコードの母集団を返す（実行単位で固定）
    pub fn classify(&self, _record: &StarRecord) -> Population {
        self.population
    }

    pub fn population(&self) -> Population {
        self.population
    }

    pub fn is_implicit_default(&self) -> bool {
        self.implicit_default
    }
}
