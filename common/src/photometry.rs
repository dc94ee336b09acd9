//! 測光モジュール
//!
//! SDSS系の ugriz バンド、色指数（u-g, g-r, r-i, i-z）と
//! 星間減光による赤化の計算を扱う。

use serde::{Deserialize, Serialize};

/// 色ベクトルの次元数
pub const COLOR_COUNT: usize = 4;

/// 測光バンド
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    U,
    G,
    R,
    I,
    Z,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::U, Band::G, Band::R, Band::I, Band::Z];

    /// A_band / A_V（R_V = 3.1）
    pub fn extinction_ratio(&self) -> f64 {
        match self {
            Band::U => 1.579,
            Band::G => 1.161,
            Band::R => 0.843,
            Band::I => 0.639,
            Band::Z => 0.453,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Band::U => "u",
            Band::G => "g",
            Band::R => "r",
            Band::I => "i",
            Band::Z => "z",
        }
    }
}

/// 色指数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "u_g")]
    UG,
    #[serde(rename = "g_r")]
    GR,
    #[serde(rename = "r_i")]
    RI,
    #[serde(rename = "i_z")]
    IZ,
}

impl Color {
    pub const ALL: [Color; COLOR_COUNT] = [Color::UG, Color::GR, Color::RI, Color::IZ];

    /// 色を構成する2バンド（短波長, 長波長）
    pub fn bands(&self) -> (Band, Band) {
        match self {
            Color::UG => (Band::U, Band::G),
            Color::GR => (Band::G, Band::R),
            Color::RI => (Band::R, Band::I),
            Color::IZ => (Band::I, Band::Z),
        }
    }

    /// ColorVector内の位置
    pub fn index(&self) -> usize {
        match self {
            Color::UG => 0,
            Color::GR => 1,
            Color::RI => 2,
            Color::IZ => 3,
        }
    }

    /// A_V に対する色超過 E(b1-b2)
    pub fn reddening(&self, a_v: f64) -> f64 {
        let (blue, red) = self.bands();
        a_v * (blue.extinction_ratio() - red.extinction_ratio())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Color::UG => "u-g",
            Color::GR => "g-r",
            Color::RI => "r-i",
            Color::IZ => "i-z",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// u-g, g-r, r-i, i-z の順に並んだ色ベクトル
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorVector(pub [f64; COLOR_COUNT]);

impl ColorVector {
    pub fn new(u_g: f64, g_r: f64, r_i: f64, i_z: f64) -> Self {
        Self([u_g, g_r, r_i, i_z])
    }

    pub fn get(&self, color: Color) -> f64 {
        self.0[color.index()]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }

    /// 赤化を取り除いた色ベクトル
    pub fn dereddened(&self, a_v: f64) -> Self {
        let mut out = self.0;
        for color in Color::ALL {
            out[color.index()] -= color.reddening(a_v);
        }
        Self(out)
    }
}

/// ugriz 等級
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Photometry {
    pub u: f64,
    pub g: f64,
    pub r: f64,
    pub i: f64,
    pub z: f64,
}

impl Photometry {
    pub fn new(u: f64, g: f64, r: f64, i: f64, z: f64) -> Self {
        Self { u, g, r, i, z }
    }

    pub fn magnitude(&self, band: Band) -> f64 {
        match band {
            Band::U => self.u,
            Band::G => self.g,
            Band::R => self.r,
            Band::I => self.i,
            Band::Z => self.z,
        }
    }

    /// 観測色（赤化補正前）
    pub fn colors(&self) -> ColorVector {
        ColorVector::new(
            self.u - self.g,
            self.g - self.r,
            self.r - self.i,
            self.i - self.z,
        )
    }

    /// 減光補正後の等級
    pub fn dereddened_magnitude(&self, band: Band, a_v: f64) -> f64 {
        self.magnitude(band) - a_v * band.extinction_ratio()
    }

    /// 非有限値を含むバンドの一覧
    pub fn non_finite_bands(&self, bands: &[Band]) -> Vec<Band> {
        bands
            .iter()
            .copied()
            .filter(|b| !self.magnitude(*b).is_finite())
            .collect()
    }
}
