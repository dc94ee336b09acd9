use clap::{Parser, Subcommand};
use star_sed_common::{Color, ColorVector, Population, COLOR_COUNT};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "star-sed")]
#[command(about = "合成星カタログのSED照合・カタログ生成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// ファイル配置の環境名 (local/cluster)
    #[arg(long, global = true)]
    pub env: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// テンプレートライブラリから索引を構築して保存
    BuildIndex {
        /// ライブラリCSV（省略時は環境設定）
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// 出力する索引ファイル（省略時は環境設定）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 入力カタログを照合してカタログを出力
    Run {
        /// 入力スライス（ファイルまたはフォルダ）
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// 出力カタログ、または出力フォルダ
        #[arg(short, long)]
        output: PathBuf,

        /// 母集団 (default/bhb/rrly/wd)
        #[arg(short, long)]
        population: Option<Population>,

        /// 索引ファイル
        #[arg(long)]
        index: Option<PathBuf>,

        /// ライブラリCSVから直接構築（索引ファイルを使わない）
        #[arg(long, conflicts_with = "index")]
        library: Option<PathBuf>,

        /// ダストマップJSON
        #[arg(long)]
        dust_map: Option<PathBuf>,

        /// 入力の A_V を無視して再計算
        #[arg(long)]
        recompute_extinction: bool,

        /// 物理効果（減光）を無効化
        #[arg(long, conflicts_with = "recompute_extinction")]
        disable_physics: bool,

        /// 採用する最大色距離 [mag]
        #[arg(long)]
        max_distance: Option<f64>,

        /// 並列スレッド数（0 で自動）
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// 一度に読み込む件数
        #[arg(long)]
        chunk_size: Option<usize>,

        /// 照合できなかった星をコメント行で出力
        #[arg(long)]
        placeholders: bool,

        /// 母集団の指定を必須にする
        #[arg(long)]
        require_population: bool,

        /// ヘッダ行を出力しない
        #[arg(long)]
        no_header: bool,
    },

    /// 色ベクトルに近いテンプレートを表示
    Query {
        /// 母集団 (default/bhb/rrly/wd)
        #[arg(short, long, default_value = "default")]
        population: Population,

        /// 色（u-g,g-r,r-i,i-z または母集団が使う色のみ）
        #[arg(short, long, allow_hyphen_values = true)]
        colors: String,

        /// 表示件数
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// 索引ファイル
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// 索引ファイルの情報表示・検証
    Index {
        /// 索引情報を表示
        #[arg(long)]
        info: bool,

        /// ライブラリと照合して古い索引を検出
        #[arg(long)]
        verify: bool,

        /// 索引ファイル（省略時は環境設定）
        #[arg(long)]
        index: Option<PathBuf>,

        /// 検証に使うライブラリCSV（省略時は環境設定）
        #[arg(long)]
        library: Option<PathBuf>,
    },

    /// 設定を表示/初期化
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定の設定ファイルを書き出す
        #[arg(long)]
        init: bool,
    },
}

/// `--colors` を色ベクトルに変換
///
/// 4色すべて、または母集団が使う色だけを並べる（使わない色は 0）。
pub fn parse_colors(s: &str, population: Population) -> Result<ColorVector, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid color value: {}", v.trim()))
        })
        .collect::<Result<_, _>>()?;

    let active = population.active_colors();
    let mut colors = ColorVector::new(0.0, 0.0, 0.0, 0.0);

    if values.len() == COLOR_COUNT {
        colors.0.copy_from_slice(&values);
    } else if values.len() == active.len() {
        for (color, value) in active.iter().zip(&values) {
            colors.0[color.index()] = *value;
        }
    } else {
        let labels: Vec<&str> = active.iter().map(Color::label).collect();
        return Err(format!(
            "Expected {} colors or {} ({}), got {}",
            COLOR_COUNT,
            active.len(),
            labels.join(","),
            values.len()
        ));
    }

    Ok(colors)
}
