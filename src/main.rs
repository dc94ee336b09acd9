use chrono::Utc;
use clap::Parser;
use star_sed_common::{
    ExtinctionMode, ExtinctionPolicy, PlaceholderPolicy, Population, PopulationRouter, SedMatcher,
};
use star_sed_rust::{catalog, cli, config, dust, error, library, pipeline, scanner, summary};
use cli::{Cli, Commands};
use config::Config;
use error::{Result, StarSedError};
use library::IndexFile;
use pipeline::{Pipeline, PipelineOptions};
use std::path::PathBuf;
use summary::{RunContext, RunSummary};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load()?;
    let env = cli.env.as_deref();

    match cli.command {
        Commands::BuildIndex { library: library_csv, output } => {
            println!("🔭 star-sed - 索引構築\n");
            let layout = config.environment(env)?;
            let library_csv = library_csv.unwrap_or_else(|| layout.library_path());
            let output = output.unwrap_or_else(|| layout.index_path());

            println!("[1/3] ライブラリを読み込み中...");
            let fingerprint = library::compute_file_fingerprint(&library_csv)?;
            let templates = library::load_library(&library_csv)?;
            println!("✔ {}件のテンプレートを検出\n", templates.len());

            println!("[2/3] 索引を構築中...");
            let index = star_sed_common::SpectralIndex::build_with_rules(
                templates,
                &config.matching.rules()?,
            )?;
            let file = IndexFile::new(index, fingerprint);
            for (population, count) in file.counts() {
                println!("  {:<8} {}件", population.code(), count);
            }
            println!("✔ 構築完了\n");

            println!("[3/3] 索引を保存中...");
            file.save(&output)?;
            println!("✔ 索引を保存: {}", output.display());

            println!("\n✅ 完了");
        }

        Commands::Run {
            inputs,
            output,
            population,
            index,
            library: library_csv,
            dust_map,
            recompute_extinction,
            disable_physics,
            max_distance,
            threads,
            chunk_size,
            placeholders,
            require_population,
            no_header,
        } => {
            println!("🚀 star-sed - カタログ生成\n");
            let started_at = Utc::now();

            let mut config = config;
            if let Some(d) = max_distance {
                config.matching.max_distance = d;
            }
            if let Some(t) = threads {
                config.threads = t;
            }
            if let Some(c) = chunk_size {
                config.chunk_size = c;
            }
            if placeholders {
                config.output.placeholder = PlaceholderPolicy::Comment;
            }
            if no_header {
                config.output.write_header = false;
            }
            config.validate()?;

            // 母集団は実行単位で1つ
            let router = if require_population || config.require_population {
                PopulationRouter::strict(population).map_err(|_| StarSedError::MissingPopulation)?
            } else {
                PopulationRouter::new(population)
            };

            let layout = config.environment(env)?;

            // 1. 索引
            println!("[1/3] 索引を準備中...");
            let loaded = match &library_csv {
                Some(csv) => library::open_index(None, csv, &config.matching.rules()?)?,
                None => {
                    let index_path = index.unwrap_or_else(|| layout.index_path());
                    library::open_index(Some(&index_path), &layout.library_path(), &config.matching.rules()?)?
                }
            };
            println!(
                "✔ {}件のテンプレート（{}）\n",
                loaded.index.len(),
                if loaded.from_file { "索引ファイル" } else { "ライブラリから構築" }
            );

            // 2. 減光モデル
            let mode = if disable_physics {
                ExtinctionMode::Disabled
            } else if recompute_extinction {
                ExtinctionMode::Recompute
            } else {
                ExtinctionMode::UseSupplied
            };
            let policy = if mode == ExtinctionMode::Disabled {
                log::warn!("--disable-physics: 全ての星で A_V = 0 として照合します");
                ExtinctionPolicy::disabled()
            } else {
                let map = dust_map.or_else(|| layout.dust_map_path());
                ExtinctionPolicy::new(mode, dust::select_model(map.as_deref())?)
            };

            // 3. 入力スライス
            println!("[2/3] 入力をスキャン中...");
            let slices = scanner::scan_inputs(&inputs)?;
            if slices.is_empty() {
                let names: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
                return Err(StarSedError::NoInputFound(names.join(", ")));
            }
            let as_directory = slices.len() > 1;
            let jobs: Vec<(PathBuf, PathBuf)> = slices
                .iter()
                .map(|s| (s.path.clone(), catalog::output_path_for(&s.path, &output, as_directory)))
                .collect();
            println!("✔ {}件の入力スライスを検出\n", jobs.len());

            // 4. 照合
            println!("[3/3] 照合中... (母集団: {}, 減光: {})", router.population(), mode);
            let options = config.matching.options();
            let matcher = SedMatcher::new(&loaded.index, &router, &policy, options.clone());
            let pipeline = Pipeline::new(
                matcher,
                PipelineOptions {
                    columns: config.input.clone(),
                    format: config.output.line_format(),
                    chunk_size: config.chunk_size,
                    write_header: config.output.write_header,
                    threads: config.threads,
                    show_progress: true,
                },
            );
            let outcomes = pipeline.run(&jobs)?;

            let context = RunContext {
                population: router.population(),
                extinction_mode: mode,
                extinction_model: policy.model_name().to_string(),
                options,
                library_fingerprint: loaded.library_fingerprint.clone(),
                started_at,
            };
            for outcome in &outcomes {
                let path = RunSummary::new(&context, outcome).save()?;
                let mark = if outcome.is_complete() { "✔" } else { "✘" };
                println!("{} {} ({}件出力)", mark, outcome.output.display(), outcome.stats.matched);
                log::debug!("サマリ: {}", path.display());
            }
            println!();

            let total = summary::total_statistics(&outcomes);
            summary::print_statistics(&total);

            if let Some(reason) = &total.aborted {
                return Err(StarSedError::InputRead(reason.clone()));
            }
            println!("\n✅ 完了");
        }

        Commands::Query { population, colors, k, index } => {
            let layout = config.environment(env)?;
            let colors = cli::parse_colors(&colors, population).map_err(StarSedError::Config)?;
            let index_path = index.unwrap_or_else(|| layout.index_path());
            let loaded = library::open_index(Some(&index_path), &layout.library_path(), &config.matching.rules()?)?;

            let candidates = loaded.index.query(&colors, population, k);
            if candidates.is_empty() {
                println!("母集団 {} のテンプレートがありません", population);
            }
            for (rank, c) in candidates.iter().enumerate() {
                println!(
                    "{:>3}. id={:<6} dist={:.5} teff={:.0} logg={:.2} feh={:+.2} {}",
                    rank + 1,
                    c.template.id,
                    c.distance,
                    c.template.params.teff,
                    c.template.params.logg,
                    c.template.params.feh,
                    c.template.name
                );
            }
        }

        Commands::Index { info, verify, index, library: library_csv } => {
            let layout = config.environment(env)?;
            let index_path = index.unwrap_or_else(|| layout.index_path());
            if !index_path.exists() {
                return Err(StarSedError::FileNotFound(index_path.display().to_string()));
            }
            let file = IndexFile::load(&index_path)?;

            if info || !verify {
                println!("索引情報:");
                println!("  パス: {}", index_path.display());
                println!("  バージョン: {}", file.version);
                println!("  構築日時: {}", file.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("  ライブラリ指紋: {}", file.library_fingerprint);
                println!("  テンプレート数: {}", file.template_count);
                for (population, count) in file.counts() {
                    println!("    {:<8} {}件", population.code(), count);
                }
                if let Ok(meta) = std::fs::metadata(&index_path) {
                    println!("  サイズ: {} bytes", meta.len());
                }
            }

            if verify {
                let library_csv = library_csv.unwrap_or_else(|| layout.library_path());
                file.verify(&library_csv)?;
                file.check_rules(&config.matching.rules()?)?;
                println!("✔ 索引はライブラリと設定に一致しています: {}", library_csv.display());
            }
        }

        Commands::Config { show, init } => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    println!("設定ファイルは既に存在します: {}", path.display());
                } else {
                    Config::default().save()?;
                    println!("✔ 設定ファイルを作成しました: {}", path.display());
                }
            }

            if show || !init {
                println!("設定:");
                println!("  既定の環境: {}", config.environment);
                for (name, layout) in &config.environments {
                    println!("  [{}] data_root={}", name, layout.data_root.display());
                    println!("      library={}", layout.library_path().display());
                    println!("      index={}", layout.index_path().display());
                    match layout.dust_map_path() {
                        Some(p) => println!("      dust_map={}", p.display()),
                        None => println!("      dust_map=（指数円盤モデル）"),
                    }
                }
                println!("  最大距離: {}", config.matching.max_distance);
                println!("  候補数 k: {}", config.matching.k);
                for population in Population::ALL {
                    if let Some(w) = config.matching.weights.get(&population) {
                        println!("  重み[{}]: {:?}", population, w);
                    }
                }
                println!("  チャンクサイズ: {}", config.chunk_size);
                println!("  スレッド数: {}", if config.threads == 0 { "自動".to_string() } else { config.threads.to_string() });
                println!("  母集団指定必須: {}", if config.require_population { "はい" } else { "いいえ" });
                println!("  ヘッダ出力: {}", if config.output.write_header { "はい" } else { "いいえ" });
                println!("  R_V: {}", config.output.r_v);
            }
        }
    }

    Ok(())
}
