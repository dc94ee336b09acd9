//! 入出力の型定義
//!
//! - StarRecord: 外部カタログ生成ツールが出力する星1件
//! - SpectralTemplate: SEDライブラリの1テンプレート
//! - MatchResult: 照合結果（1レコードにつき必ず1件）

use crate::extinction::AppliedExtinction;
use crate::photometry::{ColorVector, Photometry};
use crate::population::Population;
use serde::{Deserialize, Serialize};

/// テンプレートID（同距離のときは小さいIDを優先）
pub type TemplateId = u32;

/// 赤道座標（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self { ra_deg, dec_deg }
    }

    pub fn from_radians(ra_rad: f64, dec_rad: f64) -> Self {
        Self::new(ra_rad.to_degrees(), dec_rad.to_degrees())
    }

    pub fn is_valid(&self) -> bool {
        self.ra_deg.is_finite() && self.dec_deg.is_finite() && self.dec_deg.abs() <= 90.0
    }

    /// RA を [0, 360) に正規化
    pub fn normalized(&self) -> Self {
        Self::new(self.ra_deg.rem_euclid(360.0), self.dec_deg)
    }
}

/// テンプレートの物理パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParams {
    /// 有効温度 [K]
    pub teff: f64,
    /// 表面重力 log g [cgs]
    pub logg: f64,
    /// 金属量 [Fe/H]
    pub feh: f64,
}

/// SEDテンプレート（インデックス構築後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralTemplate {
    pub id: TemplateId,
    /// スペクトルファイルの相対パス（照合中は読み込まない）
    pub name: String,
    pub population: Population,
    pub params: PhysicalParams,
    pub colors: ColorVector,
    /// magNorm - r
    #[serde(default)]
    pub norm_offset: f64,
}

/// 入力カタログの星1件
#[derive(Debug, Clone, PartialEq)]
pub struct StarRecord {
    pub id: u64,
    pub position: SkyPosition,
    /// 距離 [pc]（不明なら NaN）
    pub distance_pc: f64,
    pub photometry: Photometry,
    pub feh: f64,
    /// 入力に含まれる計算済み A_V
    pub av: Option<f64>,
}

impl StarRecord {
    pub fn observed_colors(&self) -> ColorVector {
        self.photometry.colors()
    }
}

/// 照合ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStatus {
    Matched,
    NoCandidate,
    SkippedInvalid,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "matched"),
            MatchStatus::NoCandidate => write!(f, "no-candidate"),
            MatchStatus::SkippedInvalid => write!(f, "skipped-invalid"),
        }
    }
}

/// 照合結果
#[derive(Debug, Clone)]
pub struct MatchResult<'a> {
    /// 入力ID（読めなかった行は None）
    pub id: Option<u64>,
    pub record: Option<StarRecord>,
    pub population: Population,
    pub status: MatchStatus,
    pub template: Option<&'a SpectralTemplate>,
    /// 最良候補までの重み付き距離
    pub distance: Option<f64>,
    pub extinction: AppliedExtinction,
    /// スキップ・候補なしの理由
    pub reason: Option<String>,
}

impl<'a> MatchResult<'a> {
    /// 読み取れなかった行・不正レコード
    pub fn invalid(id: Option<u64>, population: Population, reason: impl Into<String>) -> Self {
        Self {
            id,
            record: None,
            population,
            status: MatchStatus::SkippedInvalid,
            template: None,
            distance: None,
            extinction: AppliedExtinction::not_resolved(),
            reason: Some(reason.into()),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.status == MatchStatus::Matched
    }

    /// 出力用ID `<id>.<subindex>`
    pub fn object_id(&self) -> String {
        match self.id {
            Some(id) => format!("{}.{}", id, self.population.object_type_id()),
            None => format!("?.{}", self.population.object_type_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sky_position_validity() {
        assert!(SkyPosition::new(10.0, 45.0).is_valid());
        assert!(!SkyPosition::new(10.0, 91.0).is_valid());
        assert!(!SkyPosition::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_sky_position_normalized() {
        let pos = SkyPosition::new(-10.0, 5.0).normalized();
        assert!((pos.ra_deg - 350.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_radians() {
        let pos = SkyPosition::from_radians(std::f64::consts::PI, 0.0);
        assert!((pos.ra_deg - 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_object_id() {
        let result = MatchResult::invalid(Some(42), Population::WhiteDwarf, "bad");
        assert_eq!(result.object_id(), "42.4");
        assert_eq!(result.status, MatchStatus::SkippedInvalid);
    }
}
