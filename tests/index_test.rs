//! 索引テスト
//!
//! 索引ファイルの保存・読み込みと大規模ライブラリでの最近傍探索を検証

use star_sed_common::{
    ColorVector, PhysicalParams, Population, PopulationRule, SpectralIndex, SpectralTemplate,
};
use star_sed_rust::error::StarSedError;
use star_sed_rust::library::{compute_file_fingerprint, open_index, IndexFile};
use tempfile::tempdir;

/// 決定的な擬似乱数（線形合同法）
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn random_templates(count: u32, seed: u64) -> Vec<SpectralTemplate> {
    let mut rng = Lcg(seed);
    let populations = Population::ALL;
    (0..count)
        .map(|id| SpectralTemplate {
            id,
            name: format!("kurucz/km{:02}_{}.fits_g40_{}", id % 50, 3500 + id, 3600 + id),
            population: populations[(id % 4) as usize],
            params: PhysicalParams {
                teff: 3500.0 + id as f64,
                logg: 4.0,
                feh: -((id % 50) as f64) / 10.0,
            },
            colors: ColorVector::new(
                rng.next_f64() * 3.0,
                rng.next_f64() * 1.5 - 0.3,
                rng.next_f64() * 1.0 - 0.2,
                rng.next_f64() * 0.6 - 0.1,
            ),
            norm_offset: rng.next_f64() - 0.5,
        })
        .collect()
}

/// 10,000件の中から距離0のテンプレートを見つける
#[test]
fn test_exact_template_among_many() {
    let mut templates = random_templates(10_000, 42);
    let target = ColorVector::new(1.2345, 0.4321, 0.1234, 0.0567);
    // 既定母集団の ID 37 を目標にする
    templates[37].population = Population::Default;
    templates[37].colors = target;

    let index = SpectralIndex::build(templates).unwrap();
    let best = index.nearest(&target, Population::Default).unwrap();
    assert_eq!(best.template.id, 37);
    assert_eq!(best.distance, 0.0);

    let top = index.query(&target, Population::Default, 5);
    assert_eq!(top.len(), 5);
    assert_eq!(top[0].template.id, 37);
    for pair in top.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

/// 保存した索引は再構築なしで同じ結果を返す
#[test]
fn test_index_file_round_trip() {
    let dir = tempdir().unwrap();
    let index = SpectralIndex::build(random_templates(2_000, 7)).unwrap();

    for name in ["index.json", "index.json.gz"] {
        let path = dir.path().join(name);
        IndexFile::new(index.clone(), "abc".into()).save(&path).unwrap();

        let loaded = IndexFile::load(&path).unwrap();
        assert_eq!(loaded.version, IndexFile::CURRENT_VERSION);
        assert_eq!(loaded.template_count, 2_000);
        assert_eq!(loaded.library_fingerprint, "abc");
        assert_eq!(loaded.index, index);

        let query = ColorVector::new(1.0, 0.5, 0.2, 0.1);
        for population in Population::ALL {
            let before: Vec<u32> = index.query(&query, population, 10).iter().map(|c| c.template.id).collect();
            let after: Vec<u32> = loaded.index.query(&query, population, 10).iter().map(|c| c.template.id).collect();
            assert_eq!(before, after);
        }
        assert!(!dir.path().join(format!("{}.tmp", name)).exists());
    }
}

/// 壊れた索引ファイル
#[test]
fn test_corrupt_index_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    std::fs::write(&path, "{\"version\": 1, \"index\": ").unwrap();

    assert!(matches!(IndexFile::load(&path), Err(StarSedError::JsonParse(_))));
}

/// 索引ファイルが無ければライブラリから構築、あれば読み込む
#[test]
fn test_open_index_builds_or_loads() {
    let dir = tempdir().unwrap();
    let library = dir.path().join("templates.csv");
    std::fs::write(
        &library,
        "id,name,population,teff,logg,feh,u_g,g_r,r_i,i_z,norm_offset\n\
         1,kurucz/kp00_5000.fits_g45_5100,default,,,,1.5,0.6,0.2,0.1,0\n\
         2,wDs/bergeron_12000_80.dat_12200,wd,,,,0.1,-0.3,-0.1,-0.1,0\n",
    )
    .unwrap();
    let index_path = dir.path().join("templates.index.json.gz");
    let rules: Vec<_> = Population::ALL
        .iter()
        .map(|p| star_sed_common::PopulationRule::for_population(*p))
        .collect();

    let built = open_index(Some(&index_path), &library, &rules).unwrap();
    assert!(!built.from_file);
    assert_eq!(built.index.len(), 2);
    let fingerprint = compute_file_fingerprint(&library).unwrap();
    assert_eq!(built.library_fingerprint.as_deref(), Some(fingerprint.as_str()));

    IndexFile::new(built.index, fingerprint).save(&index_path).unwrap();
    let loaded = open_index(Some(&index_path), &library, &rules).unwrap();
    assert!(loaded.from_file);
    assert_eq!(loaded.index.count_for(Population::WhiteDwarf), 1);
}

/// 重みを変えた設定では保存済みの索引を使わずライブラリから構築し直す
#[test]
fn test_open_index_rebuilds_on_rule_change() {
    let dir = tempdir().unwrap();
    let library = dir.path().join("templates.csv");
    std::fs::write(
        &library,
        "id,name,population,teff,logg,feh,u_g,g_r,r_i,i_z,norm_offset\n\
         1,bhb/t1,bhb,9000,3.5,-1.5,1.0,0.0,0.0,0.0,0\n\
         2,bhb/t2,bhb,9500,3.5,-1.5,0.0,0.8,0.0,0.0,0\n",
    )
    .unwrap();
    let index_path = dir.path().join("templates.index.json");
    let defaults: Vec<_> = Population::ALL
        .iter()
        .map(|p| PopulationRule::for_population(*p))
        .collect();
    let built = open_index(None, &library, &defaults).unwrap();
    IndexFile::new(built.index, compute_file_fingerprint(&library).unwrap())
        .save(&index_path)
        .unwrap();

    let skewed: Vec<_> = Population::ALL
        .iter()
        .map(|p| match p {
            Population::BlueHorizontalBranch => PopulationRule::for_population(*p)
                .with_weights(vec![0.1, 1.0])
                .unwrap(),
            _ => PopulationRule::for_population(*p),
        })
        .collect();

    let loaded = open_index(Some(&index_path), &library, &skewed).unwrap();
    assert!(!loaded.from_file);
    assert_eq!(
        loaded.index.rule(Population::BlueHorizontalBranch).unwrap().weights,
        vec![0.1, 1.0]
    );
    let origin = ColorVector::new(0.0, 0.0, 0.0, 0.0);
    let best = loaded.index.nearest(&origin, Population::BlueHorizontalBranch).unwrap();
    assert_eq!(best.template.id, 1);

    // ライブラリが無ければ構築できないのでエラー
    std::fs::remove_file(&library).unwrap();
    let result = open_index(Some(&index_path), &library, &skewed);
    assert!(matches!(result, Err(StarSedError::StaleIndex(_))));

    // 設定どおりの重みなら索引ファイルをそのまま使う
    let loaded = open_index(Some(&index_path), &library, &defaults).unwrap();
    assert!(loaded.from_file);
}

/// メンバー配列が途中で切れた索引ファイルは読み込み時に拒否する
#[test]
fn test_truncated_members_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.json");
    let index = SpectralIndex::build(random_templates(200, 3)).unwrap();
    IndexFile::new(index, "abc".into()).save(&path).unwrap();

    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let members = value["index"]["partitions"][0]["members"]
        .as_array_mut()
        .unwrap();
    members.truncate(members.len() / 2);
    std::fs::write(&path, value.to_string()).unwrap();

    assert!(matches!(
        IndexFile::load(&path),
        Err(StarSedError::Common(star_sed_common::Error::IndexBuild(_)))
    ));
}
