//! Column scaling and k-means clustering over wallet feature vectors.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Per-column min-max scaler. Constant columns map to 0.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    ranges: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map_or(0, Vec::len);
        let mut mins = vec![f64::INFINITY; dims];
        let mut maxs = vec![f64::NEG_INFINITY; dims];
        for row in rows {
            for (j, &v) in row.iter().enumerate() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
        let ranges = mins.iter().zip(&maxs).map(|(lo, hi)| hi - lo).collect();
        Self { mins, ranges }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, &v)| {
                        if self.ranges[j] > 0.0 {
                            (v - self.mins[j]) / self.ranges[j]
                        } else {
                            0.0
                        }
                    })
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        Self::fit(rows).transform(rows)
    }
}

/// Lloyd's k-means with k-means++ seeding and several restarts.
///
/// All randomness comes from a single `StdRng` seeded with `seed`, so the same
/// input always yields the same labels.
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold on total centre movement, relative to the mean
    /// per-column variance of the data.
    pub tol: f64,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_clusters: 5,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
}

impl KMeansFit {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Number of distinct points (exact equality).
pub fn distinct_points(points: &[Vec<f64>]) -> usize {
    let mut seen: Vec<&Vec<f64>> = Vec::new();
    for p in points {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }
    seen.len()
}

fn nearest(centroids: &[Vec<f64>], p: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centre) in centroids.iter().enumerate() {
        let d = sq_dist(centre, p);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn mean_column_variance(points: &[Vec<f64>]) -> f64 {
    let n = points.len() as f64;
    let dims = points[0].len();
    if dims == 0 {
        return 0.0;
    }
    let total: f64 = (0..dims)
        .map(|j| {
            let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
            points.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / dims as f64
}

impl KMeans {
    /// Effective cluster count for `points`: at most `n_clusters`, at most the
    /// number of distinct points, at least 1.
    pub fn effective_clusters(&self, points: &[Vec<f64>]) -> usize {
        self.n_clusters.min(distinct_points(points)).max(1)
    }

    pub fn fit(&self, points: &[Vec<f64>]) -> KMeansFit {
        if points.is_empty() {
            return KMeansFit {
                labels: Vec::new(),
                centroids: Vec::new(),
                inertia: 0.0,
            };
        }

        let k = self.effective_clusters(points);
        let tol = self.tol * mean_column_variance(points);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.n_init.max(1) {
            let seeds = kmeans_plus_plus(points, k, &mut rng);
            let run = self.lloyd(points, seeds, tol);
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        best.unwrap_or_else(|| KMeansFit {
            labels: vec![0; points.len()],
            centroids: vec![points[0].clone()],
            inertia: 0.0,
        })
    }

    fn lloyd(&self, points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, tol: f64) -> KMeansFit {
        let dims = points[0].len();
        for _ in 0..self.max_iter {
            let mut sums = vec![vec![0.0; dims]; centroids.len()];
            let mut counts = vec![0_usize; centroids.len()];
            for p in points {
                let (c, _) = nearest(&centroids, p);
                counts[c] += 1;
                for (s, v) in sums[c].iter_mut().zip(p) {
                    *s += v;
                }
            }

            let mut shift = 0.0;
            for (c, centre) in centroids.iter_mut().enumerate() {
                // An empty cluster keeps its previous centre.
                if counts[c] == 0 {
                    continue;
                }
                let updated: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                shift += sq_dist(centre, &updated);
                *centre = updated;
            }
            if shift <= tol {
                break;
            }
        }

        let mut inertia = 0.0;
        let labels = points
            .iter()
            .map(|p| {
                let (c, d) = nearest(&centroids, p);
                inertia += d;
                c
            })
            .collect();
        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }
}

/// k-means++ seeding: first centre uniformly, the rest with probability
/// proportional to squared distance from the nearest chosen centre.
fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())].clone());

    let mut d2: Vec<f64> = points.iter().map(|p| sq_dist(&centroids[0], p)).collect();
    while centroids.len() < k {
        let next = match WeightedIndex::new(&d2) {
            Ok(dist) => dist.sample(rng),
            // Every remaining point coincides with a centre; take the first unused one.
            Err(_) => match points.iter().position(|p| !centroids.contains(p)) {
                Some(i) => i,
                None => break,
            },
        };
        let centre = points[next].clone();
        for (d, p) in d2.iter_mut().zip(points) {
            *d = d.min(sq_dist(&centre, p));
        }
        centroids.push(centre);
    }
    centroids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        let centres = [[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
        let offsets = [[0.1, 0.0], [-0.1, 0.1], [0.0, -0.1], [0.05, 0.05]];
        centres
            .iter()
            .flat_map(|c| offsets.iter().map(move |o| vec![c[0] + o[0], c[1] + o[1]]))
            .collect()
    }

    #[test]
    fn test_min_max_scaler_maps_columns_to_unit_range() {
        let rows = vec![vec![1.0, 5.0, -2.0], vec![3.0, 5.0, 2.0], vec![2.0, 5.0, 0.0]];
        let scaled = MinMaxScaler::fit_transform(&rows);
        assert_eq!(scaled[0], vec![0.0, 0.0, 0.0]);
        assert_eq!(scaled[1], vec![1.0, 0.0, 1.0]);
        assert_eq!(scaled[2], vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_min_max_scaler_empty_input() {
        assert!(MinMaxScaler::fit_transform(&[]).is_empty());
    }

    #[test]
    fn test_kmeans_separates_well_spaced_blobs() {
        let points = blobs();
        let fit = KMeans {
            n_clusters: 3,
            ..KMeans::default()
        }
        .fit(&points);

        assert_eq!(fit.n_clusters(), 3);
        for group in fit.labels.chunks(4) {
            assert!(group.iter().all(|&l| l == group[0]));
        }
        let mut firsts: Vec<usize> = fit.labels.chunks(4).map(|g| g[0]).collect();
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), 3);
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn test_kmeans_is_deterministic_for_fixed_seed() {
        let points = blobs();
        let a = KMeans::default().fit(&points);
        let b = KMeans::default().fit(&points);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_kmeans_reduces_k_to_distinct_points() {
        let points = vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![1.0, 1.0]];
        let fit = KMeans::default().fit(&points);
        assert_eq!(fit.n_clusters(), 2);
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_ne!(fit.labels[0], fit.labels[2]);
        assert!(fit.inertia.abs() < f64::EPSILON);
    }

    #[test]
    fn test_kmeans_single_point() {
        let fit = KMeans::default().fit(&[vec![0.0; 10]]);
        assert_eq!(fit.labels, vec![0]);
        assert_eq!(fit.n_clusters(), 1);
    }

    #[test]
    fn test_kmeans_empty_input() {
        let fit = KMeans::default().fit(&[]);
        assert!(fit.labels.is_empty());
        assert_eq!(fit.n_clusters(), 0);
    }

    #[test]
    fn test_distinct_points() {
        let points = vec![vec![1.0], vec![1.0], vec![2.0], vec![1.0]];
        assert_eq!(distinct_points(&points), 2);
    }
}
