//! 色空間の k-d 木
//!
//! 任意次元の点に対する k 近傍探索。点ごとにキー（テンプレートID）を持ち、
//! 同距離の候補はキーの小さい順に並べる。構築後は不変で、
//! 複数スレッドから同時に検索できる。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// k-d 木
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdTree {
    dims: usize,
    /// 点座標（dims 個ずつ連続）
    points: Vec<f64>,
    keys: Vec<u32>,
    nodes: Vec<KdNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KdNode {
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    split_dim: usize,
}

/// 近傍点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 構築時の点の位置
    pub index: usize,
    pub key: u32,
    pub dist_sq: f64,
}

impl Neighbor {
    /// (距離, キー) の辞書順
    fn rank(&self, other: &Neighbor) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.key.cmp(&other.key))
    }
}

impl KdTree {
    /// 点列から木を構築する（中央値分割）
    ///
    /// 点が空、次元数が0、または座標数とキー数が合わない場合は None。
    pub fn build(dims: usize, points: Vec<f64>, keys: Vec<u32>) -> Option<Self> {
        if dims == 0 || keys.is_empty() || points.len() != dims * keys.len() {
            return None;
        }

        let mut indices: Vec<usize> = (0..keys.len()).collect();
        let mut nodes = Vec::with_capacity(keys.len());
        let mut tree = Self {
            dims,
            points,
            keys,
            nodes: Vec::new(),
        };
        tree.build_recursive(&mut indices, 0, &mut nodes);
        tree.nodes = nodes;
        Some(tree)
    }

    fn build_recursive(
        &self,
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % self.dims;

        // キーも比較に含めて構築を決定的にする
        indices.sort_by(|&a, &b| {
            self.coord(a, split_dim)
                .total_cmp(&self.coord(b, split_dim))
                .then(self.keys[a].cmp(&self.keys[b]))
        });

        let median = indices.len() / 2;
        let point_idx = indices[median];

        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx,
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let right_indices = &mut right_part[1..];

        let left = self.build_recursive(left_indices, depth + 1, nodes);
        let right = self.build_recursive(right_indices, depth + 1, nodes);

        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    /// k 近傍を (距離², キー) の昇順で返す
    pub fn k_nearest(&self, query: &[f64], k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 || query.len() != self.dims {
            return Vec::new();
        }

        let mut heap = BoundedMaxHeap::new(k);
        self.k_nearest_recursive(0, query, &mut heap);

        let mut result = heap.into_vec();
        result.sort_by(|a, b| a.rank(b));
        result
    }

    fn k_nearest_recursive(&self, node_idx: usize, query: &[f64], heap: &mut BoundedMaxHeap) {
        let node = &self.nodes[node_idx];

        heap.push(Neighbor {
            index: node.point_idx,
            key: self.keys[node.point_idx],
            dist_sq: self.distance_squared(query, node.point_idx),
        });

        let diff = query[node.split_dim] - self.coord(node.point_idx, node.split_dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(first_idx) = first {
            self.k_nearest_recursive(first_idx, query, heap);
        }

        // 同距離でキーの小さい点を取りこぼさないよう等号も探索する
        let diff_sq = diff * diff;
        if let Some(second_idx) = second {
            if !heap.is_full() || diff_sq <= heap.max_distance() {
                self.k_nearest_recursive(second_idx, query, heap);
            }
        }
    }

    /// 読み込んだ木の構造を検査する
    ///
    /// 全ての点がちょうど1回ずつ現れ、子ノードは親より後ろにあること
    /// （構築時の前順）を確かめる。
    pub fn validate(&self) -> Result<(), String> {
        if self.dims == 0 {
            return Err("tree has zero dimensions".into());
        }
        if self.keys.is_empty() || self.points.len() != self.dims * self.keys.len() {
            return Err(format!(
                "{} coordinates for {} points of dimension {}",
                self.points.len(),
                self.keys.len(),
                self.dims
            ));
        }
        if let Some(c) = self.points.iter().find(|c| !c.is_finite()) {
            return Err(format!("non-finite coordinate {}", c));
        }
        if self.nodes.len() != self.keys.len() {
            return Err(format!(
                "{} nodes for {} points",
                self.nodes.len(),
                self.keys.len()
            ));
        }

        let mut seen = vec![false; self.keys.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.point_idx >= self.keys.len() || seen[node.point_idx] {
                return Err(format!("node {} has invalid point {}", idx, node.point_idx));
            }
            seen[node.point_idx] = true;
            if node.split_dim >= self.dims {
                return Err(format!("node {} splits on dimension {}", idx, node.split_dim));
            }
            for child in [node.left, node.right].into_iter().flatten() {
                if child <= idx || child >= self.nodes.len() {
                    return Err(format!("node {} has invalid child {}", idx, child));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn key(&self, idx: usize) -> u32 {
        self.keys[idx]
    }

    pub fn point(&self, idx: usize) -> &[f64] {
        &self.points[idx * self.dims..(idx + 1) * self.dims]
    }

    #[inline]
    fn coord(&self, idx: usize, dim: usize) -> f64 {
        self.points[idx * self.dims + dim]
    }

    #[inline]
    fn distance_squared(&self, query: &[f64], idx: usize) -> f64 {
        query
            .iter()
            .zip(self.point(idx))
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// k 近傍探索用の上限付き最大ヒープ
///
/// 根が (距離², キー) で最も悪い候補。
#[derive(Debug)]
struct BoundedMaxHeap {
    capacity: usize,
    items: Vec<Neighbor>,
}

impl BoundedMaxHeap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity + 1),
        }
    }

    fn push(&mut self, item: Neighbor) {
        if self.items.len() < self.capacity {
            self.items.push(item);
            self.sift_up(self.items.len() - 1);
        } else if item.rank(&self.items[0]) == Ordering::Less {
            self.items[0] = item;
            self.sift_down(0);
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn max_distance(&self) -> f64 {
        self.items.first().map_or(f64::INFINITY, |n| n.dist_sq)
    }

    fn into_vec(self) -> Vec<Neighbor> {
        self.items
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.items[idx].rank(&self.items[parent]) == Ordering::Greater {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut largest = idx;

            if left < self.items.len()
                && self.items[left].rank(&self.items[largest]) == Ordering::Greater
            {
                largest = left;
            }
            if right < self.items.len()
                && self.items[right].rank(&self.items[largest]) == Ordering::Greater
            {
                largest = right;
            }

            if largest != idx {
                self.items.swap(idx, largest);
                idx = largest;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_2d(points: &[(f64, f64)]) -> KdTree {
        let flat: Vec<f64> = points.iter().flat_map(|&(x, y)| [x, y]).collect();
        let keys: Vec<u32> = (0..points.len() as u32).collect();
        KdTree::build(2, flat, keys).unwrap()
    }

    /// 線形探索による期待値
    fn brute_force(tree: &KdTree, query: &[f64], k: usize) -> Vec<(u32, f64)> {
        let mut all: Vec<Neighbor> = (0..tree.len())
            .map(|i| Neighbor {
                index: i,
                key: tree.key(i),
                dist_sq: tree.distance_squared(query, i),
            })
            .collect();
        all.sort_by(|a, b| a.rank(b));
        all.into_iter().take(k).map(|n| (n.key, n.dist_sq)).collect()
    }

    #[test]
    fn test_build_empty() {
        assert!(KdTree::build(2, vec![], vec![]).is_none());
    }

    #[test]
    fn test_build_mismatched_lengths() {
        assert!(KdTree::build(2, vec![1.0, 2.0, 3.0], vec![0, 1]).is_none());
        assert!(KdTree::build(0, vec![], vec![0]).is_none());
    }

    #[test]
    fn test_k_nearest_finds_exact_point() {
        let tree = tree_2d(&[(0.0, 0.0), (10.0, 10.0), (5.0, 5.0)]);
        let neighbors = tree.k_nearest(&[5.0, 5.0], 1);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].key, 2);
        assert!(neighbors[0].dist_sq < 1e-12);
    }

    #[test]
    fn test_k_nearest_order() {
        let tree = tree_2d(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (10.0, 0.0)]);
        let neighbors = tree.k_nearest(&[0.0, 0.0], 4);
        let keys: Vec<u32> = neighbors.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
        for pair in neighbors.windows(2) {
            assert!(pair[0].dist_sq <= pair[1].dist_sq);
        }
    }

    #[test]
    fn test_k_larger_than_tree() {
        let tree = tree_2d(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(tree.k_nearest(&[0.0, 0.0], 10).len(), 2);
        assert!(tree.k_nearest(&[0.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_wrong_query_dimension() {
        let tree = tree_2d(&[(0.0, 0.0)]);
        assert!(tree.k_nearest(&[0.0, 0.0, 0.0], 1).is_empty());
    }

    #[test]
    fn test_ties_broken_by_lowest_key() {
        // 原点から等距離の4点。キーの順序は座標と無関係に割り当てる
        let flat = vec![1.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0];
        let keys = vec![40, 7, 93, 12];
        let tree = KdTree::build(2, flat, keys).unwrap();

        let nearest = tree.k_nearest(&[0.0, 0.0], 1);
        assert_eq!(nearest[0].key, 7);

        let all: Vec<u32> = tree.k_nearest(&[0.0, 0.0], 4).iter().map(|n| n.key).collect();
        assert_eq!(all, vec![7, 12, 40, 93]);
    }

    #[test]
    fn test_duplicate_points() {
        let flat = vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5];
        let tree = KdTree::build(2, flat, vec![3, 1, 2]).unwrap();
        let nearest = tree.k_nearest(&[0.5, 0.5], 2);
        assert_eq!(nearest[0].key, 1);
        assert_eq!(nearest[1].key, 2);
    }

    #[test]
    fn test_matches_brute_force_4d() {
        // 決定的な擬似乱数（線形合同法）
        let mut state: u64 = 12345;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64) / (1u64 << 31) as f64
        };

        let n = 500;
        let dims = 4;
        let points: Vec<f64> = (0..n * dims).map(|_| next() * 3.0 - 1.0).collect();
        let keys: Vec<u32> = (0..n as u32).collect();
        let tree = KdTree::build(dims, points, keys).unwrap();

        for _ in 0..50 {
            let query: Vec<f64> = (0..dims).map(|_| next() * 3.0 - 1.0).collect();
            let got: Vec<(u32, f64)> = tree
                .k_nearest(&query, 5)
                .iter()
                .map(|n| (n.key, n.dist_sq))
                .collect();
            assert_eq!(got, brute_force(&tree, &query, 5));
        }
    }

    #[test]
    fn test_validate() {
        let tree = tree_2d(&[(0.0, 0.0), (1.0, 2.0), (3.0, 1.0), (2.0, 2.0)]);
        assert!(tree.validate().is_ok());

        let mut broken = tree.clone();
        broken.nodes[0].point_idx = 99;
        assert!(broken.validate().is_err());

        let mut cyclic = tree.clone();
        cyclic.nodes[1].left = Some(0);
        assert!(cyclic.validate().is_err());

        let mut truncated = tree.clone();
        truncated.points.pop();
        assert!(truncated.validate().is_err());

        let mut wrong_dim = tree;
        wrong_dim.nodes[0].split_dim = 2;
        assert!(wrong_dim.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_structure() {
        let tree = tree_2d(&[(0.0, 0.0), (1.0, 2.0), (3.0, 1.0), (2.0, 2.0)]);
        let json = serde_json::to_string(&tree).unwrap();
        let loaded: KdTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, loaded);
        assert_eq!(
            tree.k_nearest(&[1.9, 1.9], 2),
            loaded.k_nearest(&[1.9, 1.9], 2)
        );
    }
}
