use crate::error::{Result, StarSedError};
use serde::{Deserialize, Serialize};
use star_sed_common::{
    InputColumns, LineFormat, MatchOptions, PlaceholderPolicy, Population, PopulationRule,
    DEFAULT_R_V,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// データルートを上書きする環境変数
pub const DATA_ROOT_ENV: &str = "STAR_SED_DATA_ROOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `--env` 未指定時に使う環境名
    pub environment: String,
    pub environments: BTreeMap<String, EnvironmentLayout>,
    pub matching: MatchingConfig,
    pub input: InputColumns,
    pub output: OutputConfig,
    /// 1回に読み込んで並列照合する件数
    pub chunk_size: usize,
    /// 0 なら rayon の既定スレッド数
    pub threads: usize,
    /// 母集団の指定を必須にする
    pub require_population: bool,
}

/// 環境ごとのファイル配置（相対パスは data_root 基準）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentLayout {
    pub data_root: PathBuf,
    pub library: PathBuf,
    #[serde(default)]
    pub dust_map: Option<PathBuf>,
    pub index: PathBuf,
}

impl EnvironmentLayout {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_root.join(path)
        }
    }

    pub fn library_path(&self) -> PathBuf {
        self.resolve(&self.library)
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.index)
    }

    pub fn dust_map_path(&self) -> Option<PathBuf> {
        self.dust_map.as_deref().map(|p| self.resolve(p))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub max_distance: f64,
    pub k: usize,
    /// 母集団ごとの重み（active_colors と同じ並び）
    pub weights: BTreeMap<Population, Vec<f64>>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let options = MatchOptions::default();
        Self {
            max_distance: options.max_distance,
            k: options.k,
            weights: BTreeMap::new(),
        }
    }
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            max_distance: self.max_distance,
            k: self.k,
        }
    }

    /// 重みの上書きを反映した照合ルール
    pub fn rules(&self) -> Result<Vec<PopulationRule>> {
        Population::ALL
            .iter()
            .map(|p| {
                let rule = PopulationRule::for_population(*p);
                match self.weights.get(p) {
                    Some(w) => Ok(rule.with_weights(w.clone())?),
                    None => Ok(rule),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub write_header: bool,
    pub placeholder: PlaceholderPolicy,
    pub r_v: f64,
    pub sed_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let format = LineFormat::default();
        Self {
            write_header: true,
            placeholder: format.placeholder,
            r_v: DEFAULT_R_V,
            sed_prefix: format.sed_prefix,
        }
    }
}

impl OutputConfig {
    pub fn line_format(&self) -> LineFormat {
        LineFormat {
            r_v: self.r_v,
            sed_prefix: self.sed_prefix.clone(),
            placeholder: self.placeholder,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut environments = BTreeMap::new();
        environments.insert(
            "local".to_string(),
            EnvironmentLayout {
                data_root: PathBuf::from("data"),
                library: PathBuf::from("templates.csv"),
                dust_map: None,
                index: PathBuf::from("templates.index.json.gz"),
            },
        );
        environments.insert(
            "cluster".to_string(),
            EnvironmentLayout {
                data_root: PathBuf::from("/scratch/star-sed"),
                library: PathBuf::from("templates.csv"),
                dust_map: Some(PathBuf::from("dust/dustmap.json.gz")),
                index: PathBuf::from("templates.index.json.gz"),
            },
        );

        Self {
            environment: "local".to_string(),
            environments,
            matching: MatchingConfig::default(),
            input: InputColumns::default(),
            output: OutputConfig::default(),
            chunk_size: 10_000,
            threads: 0,
            require_population: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// 指定パスから読み込み（ファイルが無ければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| StarSedError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("star-sed").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        self.matching.options().validate()?;
        self.matching.rules()?;
        self.input.validate()?;

        if self.chunk_size == 0 {
            return Err(StarSedError::Config("chunk_size は1以上にしてください".into()));
        }
        if !self.output.r_v.is_finite() || self.output.r_v <= 0.0 {
            return Err(StarSedError::Config(format!(
                "r_v が不正です: {}",
                self.output.r_v
            )));
        }
        if !self.environments.contains_key(&self.environment) {
            return Err(StarSedError::Config(format!(
                "既定の環境 '{}' が environments にありません",
                self.environment
            )));
        }
        Ok(())
    }

    /// 環境を選択（STAR_SED_DATA_ROOT があればデータルートを上書き）
    pub fn environment(&self, name: Option<&str>) -> Result<EnvironmentLayout> {
        let override_root = std::env::var_os(DATA_ROOT_ENV).map(PathBuf::from);
        self.environment_with_root(name, override_root)
    }

    pub fn environment_with_root(
        &self,
        name: Option<&str>,
        data_root: Option<PathBuf>,
    ) -> Result<EnvironmentLayout> {
        let name = name.unwrap_or(&self.environment);
        let mut layout = self.environments.get(name).cloned().ok_or_else(|| {
            let known: Vec<&str> = self.environments.keys().map(|k| k.as_str()).collect();
            StarSedError::Config(format!(
                "環境 '{}' は定義されていません（定義済み: {}）",
                name,
                known.join(", ")
            ))
        })?;

        if let Some(root) = data_root {
            layout.data_root = root;
        }
        Ok(layout)
    }
}
