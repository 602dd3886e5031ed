// kmeans.rs
//
// One-dimensional k-means (Lloyd's algorithm with k-means++ seeding) and
// DBSCAN, used to split congestion scores into severity bands.

use crate::error::{EngineError, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<f64>,
    /// Cluster index for every input value.
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
}

#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    /// Independent restarts; the fit with the lowest inertia wins.
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize, random_state: u64) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state,
        }
    }

    pub fn fit(&self, data: &[f64]) -> Result<KMeansFit> {
        if self.n_clusters == 0 {
            return Err(EngineError::ModelScoring(
                "kmeans needs at least one cluster".to_string(),
            ));
        }
        if data.len() < self.n_clusters {
            return Err(EngineError::ModelScoring(format!(
                "kmeans got {} samples for {} clusters",
                data.len(),
                self.n_clusters
            )));
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(EngineError::ModelScoring(
                "kmeans input contains non-finite values".to_string(),
            ));
        }

        let mut rng = SmallRng::seed_from_u64(self.random_state);
        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.n_init.max(1) {
            let seeds = self.plus_plus_seeds(data, &mut rng);
            let fit = self.lloyd(data, seeds);
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.ok_or_else(|| EngineError::ModelScoring("kmeans produced no fit".to_string()))
    }

    fn plus_plus_seeds(&self, data: &[f64], rng: &mut SmallRng) -> Vec<f64> {
        let mut centroids = Vec::with_capacity(self.n_clusters);
        centroids.push(data[rng.random_range(0..data.len())]);

        while centroids.len() < self.n_clusters {
            let distances: Vec<f64> = data
                .iter()
                .map(|&x| {
                    centroids
                        .iter()
                        .map(|&c| (x - c) * (x - c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = distances.iter().sum();

            let next = if total <= 0.0 {
                data[rng.random_range(0..data.len())]
            } else {
                let mut target = rng.random::<f64>() * total;
                let mut chosen = data[data.len() - 1];
                for (x, d) in data.iter().zip(&distances) {
                    if target < *d {
                        chosen = *x;
                        break;
                    }
                    target -= d;
                }
                chosen
            };
            centroids.push(next);
        }
        centroids
    }

    fn lloyd(&self, data: &[f64], mut centroids: Vec<f64>) -> KMeansFit {
        let mut labels = vec![0usize; data.len()];
        for _ in 0..self.max_iter {
            for (label, &x) in labels.iter_mut().zip(data) {
                *label = nearest(&centroids, x);
            }

            let mut sums = vec![0.0; centroids.len()];
            let mut counts = vec![0usize; centroids.len()];
            for (&label, &x) in labels.iter().zip(data) {
                sums[label] += x;
                counts[label] += 1;
            }

            let mut shift: f64 = 0.0;
            for (k, centroid) in centroids.iter_mut().enumerate() {
                // Empty clusters keep their previous centroid.
                if counts[k] > 0 {
                    let updated = sums[k] / counts[k] as f64;
                    shift = shift.max((updated - *centroid).abs());
                    *centroid = updated;
                }
            }
            if shift <= self.tol {
                break;
            }
        }

        for (label, &x) in labels.iter_mut().zip(data) {
            *label = nearest(&centroids, x);
        }
        let inertia = labels
            .iter()
            .zip(data)
            .map(|(&label, &x)| (x - centroids[label]).powi(2))
            .sum();

        KMeansFit {
            centroids,
            labels,
            inertia,
        }
    }
}

/// Index of the closest centroid; ties go to the lower index.
fn nearest(centroids: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (k, &c) in centroids.iter().enumerate() {
        let distance = (x - c).abs();
        if distance < best_distance {
            best = k;
            best_distance = distance;
        }
    }
    best
}

/// Density-based clustering over scalar values. Noise points get `None`.
pub fn dbscan(data: &[f64], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let neighbours = |i: usize| -> Vec<usize> {
        (0..data.len())
            .filter(|&j| (data[i] - data[j]).abs() <= eps)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; data.len()];
    let mut visited = vec![false; data.len()];
    let mut next_cluster = 0;

    for i in 0..data.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = neighbours(i);
        if seeds.len() < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = Some(cluster);

        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let reach = neighbours(j);
            if reach.len() >= min_samples {
                queue.extend(reach);
            }
        }
    }
    labels
}
