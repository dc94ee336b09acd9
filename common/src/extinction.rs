//! 星間減光モジュール
//!
//! 視線方向と距離から A_V を求める3次元ダストモデルと、
//! 入力値の採用・再計算・無効化を切り替える減光ポリシー。
//!
//! ## モデル
//! - `DustMap`: 銀河座標の格子ごとに距離方向の累積 A_V を持つ3次元マップ
//! - `ExponentialDisk`: 指数円盤の解析モデル（マップ未指定時）

use crate::error::{Error, Result};
use crate::types::{SkyPosition, StarRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 既定の R_V
pub const DEFAULT_R_V: f64 = 3.1;

/// ICRS → 銀河座標の回転行列（IAU 1958 / Liu et al. 2011）
#[allow(clippy::excessive_precision)]
const ICRS_TO_GALACTIC: [[f64; 3]; 3] = [
    [
        -0.054875560416215368492398900454,
        -0.873437090234885048760383168409,
        -0.483835015548713226831774175116,
    ],
    [
        0.494109427875583673525222371358,
        -0.444829629960011178146614061616,
        0.746982244497218890527388004556,
    ],
    [
        -0.867666149019004701181616534570,
        -0.198076373431201528180486091412,
        0.455983776175066922272100478348,
    ],
];

/// 銀河座標（度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalacticCoords {
    /// [0, 360)
    pub l_deg: f64,
    /// [-90, 90]
    pub b_deg: f64,
}

/// 赤道座標から銀河座標へ変換
pub fn icrs_to_galactic(position: &SkyPosition) -> GalacticCoords {
    let ra = position.ra_deg.to_radians();
    let dec = position.dec_deg.to_radians();
    let v = [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()];

    let mut g = [0.0; 3];
    for (row, out) in ICRS_TO_GALACTIC.iter().zip(g.iter_mut()) {
        *out = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }

    let l = g[1].atan2(g[0]).to_degrees().rem_euclid(360.0);
    let b = g[2].clamp(-1.0, 1.0).asin().to_degrees();
    GalacticCoords { l_deg: l, b_deg: b }
}

/// 視線方向の減光モデル
///
/// 実装は決定的で、読み取り専用として複数スレッドから共有される。
pub trait ExtinctionModel: Send + Sync + std::fmt::Debug {
    /// 位置と距離 [pc] に対する A_V
    fn extinction(&self, position: &SkyPosition, distance_pc: f64) -> Result<f64>;

    fn name(&self) -> &str;
}

fn check_inputs(position: &SkyPosition, distance_pc: f64) -> Result<()> {
    if !position.is_valid() {
        return Err(Error::Extinction(format!(
            "invalid position ra={} dec={}",
            position.ra_deg, position.dec_deg
        )));
    }
    if !distance_pc.is_finite() || distance_pc < 0.0 {
        return Err(Error::Extinction(format!("invalid distance {} pc", distance_pc)));
    }
    Ok(())
}

/// 指数円盤モデル
///
/// A_V(d) = a0 · h / |sin b| · (1 − exp(−d |sin b| / h))
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialDisk {
    /// 銀河面での減光率 [mag/kpc]
    pub a0_per_kpc: f64,
    /// ダストのスケールハイト [pc]
    pub scale_height_pc: f64,
}

impl Default for ExponentialDisk {
    fn default() -> Self {
        Self {
            a0_per_kpc: 1.0,
            scale_height_pc: 100.0,
        }
    }
}

impl ExtinctionModel for ExponentialDisk {
    fn extinction(&self, position: &SkyPosition, distance_pc: f64) -> Result<f64> {
        check_inputs(position, distance_pc)?;

        let a0 = self.a0_per_kpc / 1000.0;
        let sin_b = icrs_to_galactic(position).b_deg.to_radians().sin().abs();

        // 銀河面近傍では極限 a0 * d
        if sin_b < 1e-6 {
            return Ok(a0 * distance_pc);
        }

        let h = self.scale_height_pc;
        Ok(a0 * h / sin_b * (1.0 - (-distance_pc * sin_b / h).exp()))
    }

    fn name(&self) -> &str {
        "exponential-disk"
    }
}

/// 3次元ダストマップ
///
/// `cells` は (b, l) の行優先で、各セルは `distances_pc` に対応する累積 A_V。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustMap {
    pub l_step_deg: f64,
    pub b_step_deg: f64,
    pub distances_pc: Vec<f64>,
    pub cells: Vec<Vec<f64>>,
}

impl DustMap {
    fn grid_size(&self) -> (usize, usize) {
        let n_l = (360.0 / self.l_step_deg).round() as usize;
        let n_b = (180.0 / self.b_step_deg).round() as usize;
        (n_l, n_b)
    }

    /// 格子の整合性を確認
    pub fn validate(&self) -> Result<()> {
        let step_ok = |s: f64| s.is_finite() && s > 0.0 && s <= 360.0;
        if !step_ok(self.l_step_deg) || !step_ok(self.b_step_deg) || self.b_step_deg > 180.0 {
            return Err(Error::Config(format!(
                "dust map steps must be positive (l={}, b={})",
                self.l_step_deg, self.b_step_deg
            )));
        }
        if self.distances_pc.is_empty() {
            return Err(Error::Config("dust map has no distance bins".into()));
        }
        if self.distances_pc.iter().any(|d| !d.is_finite() || *d <= 0.0)
            || self.distances_pc.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(Error::Config(
                "dust map distances must be positive and strictly increasing".into(),
            ));
        }

        let (n_l, n_b) = self.grid_size();
        if self.cells.len() != n_l * n_b {
            return Err(Error::Config(format!(
                "dust map expects {} cells ({} x {}), found {}",
                n_l * n_b,
                n_b,
                n_l,
                self.cells.len()
            )));
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.len() != self.distances_pc.len() {
                return Err(Error::Config(format!(
                    "dust map cell {} has {} values, expected {}",
                    i,
                    cell.len(),
                    self.distances_pc.len()
                )));
            }
            if cell.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::Config(format!(
                    "dust map cell {} has negative or non-finite values",
                    i
                )));
            }
        }
        Ok(())
    }

    fn cell_index(&self, coords: &GalacticCoords) -> usize {
        let (n_l, n_b) = self.grid_size();
        let bi = (((coords.b_deg + 90.0) / self.b_step_deg).floor() as usize).min(n_b - 1);
        let li = ((coords.l_deg / self.l_step_deg).floor() as usize) % n_l;
        bi * n_l + li
    }

    /// 累積プロファイルを距離で線形補間（距離0で A_V=0）
    fn interpolate(&self, profile: &[f64], distance_pc: f64) -> Result<f64> {
        let max = self.distances_pc[self.distances_pc.len() - 1];
        if distance_pc > max {
            return Err(Error::Extinction(format!(
                "distance {} pc beyond dust map range ({} pc)",
                distance_pc, max
            )));
        }

        let mut prev_d = 0.0;
        let mut prev_a = 0.0;
        for (d, a) in self.distances_pc.iter().zip(profile) {
            if distance_pc <= *d {
                let t = (distance_pc - prev_d) / (d - prev_d);
                return Ok(prev_a + t * (a - prev_a));
            }
            prev_d = *d;
            prev_a = *a;
        }
        Ok(prev_a)
    }
}

impl ExtinctionModel for DustMap {
    fn extinction(&self, position: &SkyPosition, distance_pc: f64) -> Result<f64> {
        check_inputs(position, distance_pc)?;
        let coords = icrs_to_galactic(position);
        let profile = &self.cells[self.cell_index(&coords)];
        self.interpolate(profile, distance_pc)
    }

    fn name(&self) -> &str {
        "dust-map"
    }
}

/// 減光の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtinctionMode {
    /// 入力値があれば採用し、無ければモデルで計算
    #[default]
    UseSupplied,
    /// 入力値を無視して常に再計算
    Recompute,
    /// 物理効果を無効化（A_V = 0）
    Disabled,
}

impl std::fmt::Display for ExtinctionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtinctionMode::UseSupplied => write!(f, "use-supplied"),
            ExtinctionMode::Recompute => write!(f, "recompute"),
            ExtinctionMode::Disabled => write!(f, "disabled"),
        }
    }
}

/// 適用した減光の出所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtinctionSource {
    Supplied,
    Computed,
    Disabled,
    /// 計算失敗で 0 を採用
    Fallback,
    /// 不正レコードのため未解決
    NotResolved,
}

/// レコードに適用した減光
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedExtinction {
    pub a_v: f64,
    pub source: ExtinctionSource,
    pub error: Option<String>,
}

impl AppliedExtinction {
    pub fn not_resolved() -> Self {
        Self {
            a_v: 0.0,
            source: ExtinctionSource::NotResolved,
            error: None,
        }
    }
}

/// 減光ポリシー
#[derive(Debug, Clone)]
pub struct ExtinctionPolicy {
    mode: ExtinctionMode,
    model: Arc<dyn ExtinctionModel>,
}

impl ExtinctionPolicy {
    pub fn new(mode: ExtinctionMode, model: Arc<dyn ExtinctionModel>) -> Self {
        Self { mode, model }
    }

    /// 物理効果なし（テスト用）
    pub fn disabled() -> Self {
        Self::new(ExtinctionMode::Disabled, Arc::new(ExponentialDisk::default()))
    }

    pub fn mode(&self) -> ExtinctionMode {
        self.mode
    }

    pub fn is_disabled(&self) -> bool {
        self.mode == ExtinctionMode::Disabled
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// レコードに適用する A_V を決める
    ///
    /// 計算失敗はレコード単位で吸収し、0 と Fallback を返す。
    pub fn resolve(&self, record: &StarRecord) -> AppliedExtinction {
        match self.mode {
            ExtinctionMode::Disabled => AppliedExtinction {
                a_v: 0.0,
                source: ExtinctionSource::Disabled,
                error: None,
            },
            ExtinctionMode::UseSupplied if record.av.is_some() => AppliedExtinction {
                a_v: record.av.unwrap_or(0.0),
                source: ExtinctionSource::Supplied,
                error: None,
            },
            _ => self.compute(record),
        }
    }

    fn compute(&self, record: &StarRecord) -> AppliedExtinction {
        let computed = self
            .model
            .extinction(&record.position, record.distance_pc)
            .and_then(|a_v| {
                if a_v.is_finite() && a_v >= 0.0 {
                    Ok(a_v)
                } else {
                    Err(Error::Extinction(format!("model returned {}", a_v)))
                }
            });

        match computed {
            Ok(a_v) => AppliedExtinction {
                a_v,
                source: ExtinctionSource::Computed,
                error: None,
            },
            Err(e) => {
                log::debug!("star {}: extinction fallback to 0: {}", record.id, e);
                AppliedExtinction {
                    a_v: 0.0,
                    source: ExtinctionSource::Fallback,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
