//! スペクトルライブラリ索引
//!
//! SEDテンプレート全体を保持し、母集団ごとに重み付き色空間の
//! k-d 木を構築する。構築後は読み取り専用で、シリアライズして
//! 再構築なしに読み込める。

use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::photometry::ColorVector;
use crate::population::{Population, PopulationRule};
use crate::types::{SpectralTemplate, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 照合候補
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub template: &'a SpectralTemplate,
    /// 重み付きユークリッド距離
    pub distance: f64,
}

/// 母集団ごとの区画
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Partition {
    rule: PopulationRule,
    /// templates 内の位置
    members: Vec<usize>,
    tree: Option<KdTree>,
}

/// SEDテンプレート索引
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralIndex {
    /// ID昇順
    templates: Vec<SpectralTemplate>,
    partitions: Vec<Partition>,
}

impl SpectralIndex {
    /// 既定の照合ルールで構築
    pub fn build(templates: Vec<SpectralTemplate>) -> Result<Self> {
        let rules: Vec<PopulationRule> = Population::ALL
            .iter()
            .map(|p| PopulationRule::for_population(*p))
            .collect();
        Self::build_with_rules(templates, &rules)
    }

    /// 母集団ごとのルールを指定して構築
    ///
    /// ルールが与えられなかった母集団は既定ルールを使う。
    pub fn build_with_rules(
        mut templates: Vec<SpectralTemplate>,
        rules: &[PopulationRule],
    ) -> Result<Self> {
        if templates.is_empty() {
            return Err(Error::IndexBuild("template collection is empty".into()));
        }

        let mut seen = HashSet::with_capacity(templates.len());
        for template in &templates {
            if !seen.insert(template.id) {
                return Err(Error::IndexBuild(format!(
                    "duplicate template id {} ({})",
                    template.id, template.name
                )));
            }
            if !template.colors.is_finite() {
                return Err(Error::IndexBuild(format!(
                    "template {} ({}) has non-finite colors {:?}",
                    template.id, template.name, template.colors.0
                )));
            }
            if !template.norm_offset.is_finite() {
                return Err(Error::IndexBuild(format!(
                    "template {} ({}) has non-finite norm offset",
                    template.id, template.name
                )));
            }
        }

        templates.sort_by_key(|t| t.id);

        let partitions = Population::ALL
            .iter()
            .map(|population| {
                let rule = rules
                    .iter()
                    .find(|r| r.population == *population)
                    .cloned()
                    .unwrap_or_else(|| PopulationRule::for_population(*population));
                Self::build_partition(&templates, rule)
            })
            .collect();

        Ok(Self {
            templates,
            partitions,
        })
    }

    fn build_partition(templates: &[SpectralTemplate], rule: PopulationRule) -> Partition {
        let members: Vec<usize> = templates
            .iter()
            .enumerate()
            .filter(|(_, t)| t.population == rule.population)
            .map(|(i, _)| i)
            .collect();

        let points: Vec<f64> = members
            .iter()
            .flat_map(|&i| rule.project(&templates[i].colors))
            .collect();
        let keys: Vec<u32> = members.iter().map(|&i| templates[i].id).collect();
        let tree = KdTree::build(rule.dimensions(), points, keys);

        Partition {
            rule,
            members,
            tree,
        }
    }

    /// 読み込んだ索引の整合性を検査する
    ///
    /// 索引ファイルは外部から書き換えられうるので、照合に使う前に
    /// 区画のメンバーと木の点がテンプレートと対応していることを確かめる。
    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(Error::IndexBuild("template collection is empty".into()));
        }
        if self.templates.windows(2).any(|w| w[0].id >= w[1].id) {
            return Err(Error::IndexBuild(
                "template ids are not strictly ascending".into(),
            ));
        }
        if let Some(t) = self
            .templates
            .iter()
            .find(|t| !t.colors.is_finite() || !t.norm_offset.is_finite())
        {
            return Err(Error::IndexBuild(format!(
                "template {} ({}) has non-finite values",
                t.id, t.name
            )));
        }

        for population in Population::ALL {
            let count = self
                .partitions
                .iter()
                .filter(|p| p.rule.population == population)
                .count();
            if count != 1 {
                return Err(Error::IndexBuild(format!(
                    "{} partitions for population {}",
                    count, population
                )));
            }
        }

        for partition in &self.partitions {
            self.validate_partition(partition)?;
        }
        Ok(())
    }

    fn validate_partition(&self, partition: &Partition) -> Result<()> {
        let rule = &partition.rule;
        let population = rule.population;
        if rule.colors.as_slice() != population.active_colors() {
            return Err(Error::IndexBuild(format!(
                "{}: colors {:?} do not match the population",
                population, rule.colors
            )));
        }
        PopulationRule::for_population(population)
            .with_weights(rule.weights.clone())
            .map_err(|e| Error::IndexBuild(e.to_string()))?;

        let expected = self
            .templates
            .iter()
            .filter(|t| t.population == population)
            .count();
        if partition.members.len() != expected {
            return Err(Error::IndexBuild(format!(
                "{}: {} members for {} templates",
                population,
                partition.members.len(),
                expected
            )));
        }
        for (n, &member) in partition.members.iter().enumerate() {
            let template = self.templates.get(member).ok_or_else(|| {
                Error::IndexBuild(format!("{}: member {} out of range", population, member))
            })?;
            if template.population != population {
                return Err(Error::IndexBuild(format!(
                    "{}: member {} is template {} of population {}",
                    population, member, template.id, template.population
                )));
            }
            if n > 0 && partition.members[n - 1] >= member {
                return Err(Error::IndexBuild(format!(
                    "{}: members are not strictly ascending",
                    population
                )));
            }
        }

        let tree = match &partition.tree {
            None if partition.members.is_empty() => return Ok(()),
            None => {
                return Err(Error::IndexBuild(format!("{}: tree is missing", population)))
            }
            Some(tree) => tree,
        };
        tree.validate()
            .map_err(|e| Error::IndexBuild(format!("{}: {}", population, e)))?;
        if tree.dims() != rule.dimensions() || tree.len() != partition.members.len() {
            return Err(Error::IndexBuild(format!(
                "{}: tree of {} points in {} dimensions for {} members in {} dimensions",
                population,
                tree.len(),
                tree.dims(),
                partition.members.len(),
                rule.dimensions()
            )));
        }
        for (n, &member) in partition.members.iter().enumerate() {
            let template = &self.templates[member];
            if tree.key(n) != template.id || tree.point(n) != rule.project(&template.colors).as_slice() {
                return Err(Error::IndexBuild(format!(
                    "{}: tree point {} does not match template {}",
                    population, n, template.id
                )));
            }
        }
        Ok(())
    }

    fn partition(&self, population: Population) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.rule.population == population)
    }

    /// 色ベクトルに近いテンプレートを最大 k 件返す
    ///
    /// 距離の昇順、同距離ならテンプレートIDの昇順。
    pub fn query(
        &self,
        colors: &ColorVector,
        population: Population,
        k: usize,
    ) -> Vec<Candidate<'_>> {
        let Some(partition) = self.partition(population) else {
            return Vec::new();
        };
        let Some(tree) = &partition.tree else {
            return Vec::new();
        };

        let query = partition.rule.project(colors);
        tree.k_nearest(&query, k)
            .into_iter()
            .map(|n| Candidate {
                template: &self.templates[partition.members[n.index]],
                distance: n.dist_sq.sqrt(),
            })
            .collect()
    }

    /// 最近傍の1件
    pub fn nearest(&self, colors: &ColorVector, population: Population) -> Option<Candidate<'_>> {
        self.query(colors, population, 1).into_iter().next()
    }

    pub fn rule(&self, population: Population) -> Option<&PopulationRule> {
        self.partition(population).map(|p| &p.rule)
    }

    pub fn template(&self, id: TemplateId) -> Option<&SpectralTemplate> {
        self.templates
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &self.templates[i])
    }

    pub fn templates(&self) -> &[SpectralTemplate] {
        &self.templates
    }

    /// 母集団ごとのテンプレート数
    pub fn count_for(&self, population: Population) -> usize {
        self.partition(population).map_or(0, |p| p.members.len())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhysicalParams;

    fn template(id: TemplateId, population: Population, colors: [f64; 4]) -> SpectralTemplate {
        SpectralTemplate {
            id,
            name: format!("t{}", id),
            population,
            params: PhysicalParams { teff: 5000.0, logg: 4.5, feh: 0.0 },
            colors: ColorVector(colors),
            norm_offset: 0.0,
        }
    }

    #[test]
    fn test_build_empty_fails() {
        let err = SpectralIndex::build(vec![]).unwrap_err();
        assert!(matches!(err, Error::IndexBuild(_)));
    }

    #[test]
    fn test_build_non_finite_fails() {
        let templates = vec![
            template(1, Population::Default, [1.0, 0.5, 0.2, 0.1]),
            template(2, Population::Default, [1.0, f64::NAN, 0.2, 0.1]),
        ];
        let err = SpectralIndex::build(templates).unwrap_err();
        assert!(matches!(err, Error::IndexBuild(msg) if msg.contains("template 2")));
    }

    #[test]
    fn test_build_duplicate_id_fails() {
        let templates = vec![
            template(5, Population::Default, [1.0, 0.5, 0.2, 0.1]),
            template(5, Population::WhiteDwarf, [0.0, 0.0, 0.0, 0.0]),
        ];
        assert!(SpectralIndex::build(templates).is_err());
    }

    #[test]
    fn test_query_is_population_scoped() {
        let templates = vec![
            template(1, Population::Default, [1.0, 0.5, 0.2, 0.1]),
            template(2, Population::WhiteDwarf, [1.0, 0.5, 0.2, 0.1]),
            template(3, Population::WhiteDwarf, [0.0, -0.2, -0.1, -0.1]),
        ];
        let index = SpectralIndex::build(templates).unwrap();
        let colors = ColorVector::new(1.0, 0.5, 0.2, 0.1);

        assert_eq!(index.nearest(&colors, Population::Default).unwrap().template.id, 1);
        assert_eq!(index.nearest(&colors, Population::WhiteDwarf).unwrap().template.id, 2);
        assert!(index.query(&colors, Population::RrLyrae, 3).is_empty());
        assert_eq!(index.count_for(Population::WhiteDwarf), 2);
        assert_eq!(index.count_for(Population::BlueHorizontalBranch), 0);
    }

    #[test]
    fn test_query_sorted_by_distance() {
        let templates: Vec<_> = (0..50)
            .map(|i| {
                let x = i as f64 * 0.05;
                template(i, Population::RrLyrae, [9.0, x, x / 2.0, 0.0])
            })
            .collect();
        let index = SpectralIndex::build(templates).unwrap();
        let result = index.query(&ColorVector::new(0.0, 0.71, 0.33, 0.0), Population::RrLyrae, 10);
        assert_eq!(result.len(), 10);
        for pair in result.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_query_tie_prefers_lowest_id() {
        // RR Lyrae は g-r, r-i のみ使うので u-g, i-z が違っても同距離
        let templates = vec![
            template(30, Population::RrLyrae, [0.0, 0.2, 0.1, 0.0]),
            template(11, Population::RrLyrae, [5.0, 0.2, 0.1, 3.0]),
            template(20, Population::RrLyrae, [2.0, 0.2, 0.1, 1.0]),
        ];
        let index = SpectralIndex::build(templates).unwrap();
        let best = index.nearest(&ColorVector::new(0.0, 0.2, 0.1, 0.0), Population::RrLyrae).unwrap();
        assert_eq!(best.template.id, 11);
        assert_eq!(best.distance, 0.0);
    }

    #[test]
    fn test_custom_rule_weights_change_metric() {
        let templates = vec![
            template(1, Population::BlueHorizontalBranch, [1.0, 0.0, 0.0, 0.0]),
            template(2, Population::BlueHorizontalBranch, [0.0, 0.8, 0.0, 0.0]),
        ];
        let query = ColorVector::new(0.0, 0.0, 0.0, 0.0);

        let even = SpectralIndex::build(templates.clone()).unwrap();
        assert_eq!(even.nearest(&query, Population::BlueHorizontalBranch).unwrap().template.id, 2);

        let rule = PopulationRule::for_population(Population::BlueHorizontalBranch)
            .with_weights(vec![0.1, 1.0])
            .unwrap();
        let skewed = SpectralIndex::build_with_rules(templates, &[rule]).unwrap();
        let best = skewed.nearest(&query, Population::BlueHorizontalBranch).unwrap();
        assert_eq!(best.template.id, 1);
        assert!((best.distance - 0.1f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_validate_built_index() {
        let templates = vec![
            template(1, Population::Default, [1.0, 0.5, 0.2, 0.1]),
            template(2, Population::WhiteDwarf, [0.1, -0.3, -0.1, -0.1]),
            template(3, Population::Default, [1.2, 0.6, 0.3, 0.1]),
        ];
        let index = SpectralIndex::build(templates).unwrap();
        assert!(index.validate().is_ok());

        let mut truncated = index.clone();
        truncated.partitions[0].members.pop();
        assert!(matches!(truncated.validate(), Err(Error::IndexBuild(_))));

        let mut out_of_range = index.clone();
        out_of_range.partitions[0].members = vec![0, 99];
        assert!(matches!(out_of_range.validate(), Err(Error::IndexBuild(_))));

        // 既定母集団のメンバーに白色矮星を混ぜる
        let mut foreign = index.clone();
        foreign.partitions[0].members = vec![0, 1];
        assert!(matches!(foreign.validate(), Err(Error::IndexBuild(_))));

        let mut weights = index.clone();
        weights.partitions[0].rule.weights = vec![1.0, 1.0];
        assert!(matches!(weights.validate(), Err(Error::IndexBuild(_))));

        let mut missing = index;
        missing.partitions.pop();
        assert!(matches!(missing.validate(), Err(Error::IndexBuild(_))));
    }

    #[test]
    fn test_template_lookup() {
        let templates = vec![
            template(9, Population::Default, [1.0, 0.5, 0.2, 0.1]),
            template(3, Population::Default, [1.1, 0.5, 0.2, 0.1]),
        ];
        let index = SpectralIndex::build(templates).unwrap();
        assert_eq!(index.template(3).unwrap().name, "t3");
        assert!(index.template(4).is_none());
        assert_eq!(index.templates()[0].id, 3);
    }
}
