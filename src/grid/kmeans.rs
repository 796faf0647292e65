//! Seeded k-means clustering over lat/lon points.

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::nearest::nearest_index;
use super::types::Coord;
use crate::error::ReduceError;

/// Result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster centres, one per cluster index.
    pub centroids: Vec<Coord>,
    /// Cluster index for each input point.
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its centre.
    pub inertia: f64,
}

/// Lloyd's k-means with k-means++ seeding and several restarts.
///
/// A single RNG seeded from `seed` drives every restart in order, so the
/// fit is fully determined by `(points, k, seed, n_init, max_iter)`.
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            n_init: 10,
            max_iter: 300,
        }
    }

    /// Clusters `points`, keeping the restart with the lowest inertia.
    ///
    /// Earlier restarts win inertia ties.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::TooFewPoints`] if `k` is zero or larger than
    /// the number of points.
    pub fn fit(&self, points: &[Coord]) -> Result<KMeansFit, ReduceError> {
        if self.k == 0 || points.len() < self.k {
            return Err(ReduceError::TooFewPoints {
                k: self.k,
                n: points.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;
        for _ in 0..self.n_init.max(1) {
            let seeds = self.plus_plus_seeds(points, &mut rng);
            let fit = self.lloyd(points, seeds);
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        best.ok_or(ReduceError::TooFewPoints {
            k: self.k,
            n: points.len(),
        })
    }

    fn plus_plus_seeds(&self, points: &[Coord], rng: &mut StdRng) -> Vec<Coord> {
        let mut centroids = Vec::with_capacity(self.k);
        centroids.push(points[rng.random_range(0..points.len())]);

        let mut d2: Vec<f64> = points
            .iter()
            .map(|p| squared(p.distance(&centroids[0])))
            .collect();

        while centroids.len() < self.k {
            let total: f64 = d2.iter().sum();
            let pick = if total > 0.0 {
                let mut target = rng.random::<f64>() * total;
                let mut chosen = points.len() - 1;
                for (i, w) in d2.iter().enumerate() {
                    if target < *w {
                        chosen = i;
                        break;
                    }
                    target -= w;
                }
                chosen
            } else {
                rng.random_range(0..points.len())
            };
            let c = points[pick];
            centroids.push(c);
            for (d, p) in d2.iter_mut().zip(points) {
                *d = d.min(squared(p.distance(&c)));
            }
        }
        centroids
    }

    fn lloyd(&self, points: &[Coord], mut centroids: Vec<Coord>) -> KMeansFit {
        let mut labels = assign(points, &centroids);

        for _ in 0..self.max_iter {
            centroids = self.update(points, &labels, &centroids);
            let next = assign(points, &centroids);
            if next == labels {
                break;
            }
            labels = next;
        }

        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared(p.distance(&centroids[l])))
            .sum();
        KMeansFit {
            centroids,
            labels,
            inertia,
        }
    }

    /// Recomputes centres as member means. An empty cluster takes over the
    /// point farthest from its current centre.
    fn update(&self, points: &[Coord], labels: &[usize], previous: &[Coord]) -> Vec<Coord> {
        let mut sums = vec![(0.0_f64, 0.0_f64, 0_usize); self.k];
        for (p, &l) in points.iter().zip(labels) {
            sums[l].0 += p.lat;
            sums[l].1 += p.lon;
            sums[l].2 += 1;
        }

        let mut centroids: Vec<Coord> = sums
            .iter()
            .zip(previous)
            .map(|(&(lat, lon, n), prev)| {
                if n > 0 {
                    Coord::new(lat / n as f64, lon / n as f64)
                } else {
                    *prev
                }
            })
            .collect();

        let mut taken = vec![false; points.len()];
        for c in 0..self.k {
            if sums[c].2 > 0 {
                continue;
            }
            let farthest = points
                .iter()
                .enumerate()
                .filter(|(i, _)| !taken[*i])
                .map(|(i, p)| (i, p.distance(&centroids[labels[i]])))
                .fold(None::<(usize, f64)>, |acc, (i, d)| match acc {
                    Some((_, best)) if d <= best => acc,
                    _ => Some((i, d)),
                });
            if let Some((i, _)) = farthest {
                taken[i] = true;
                centroids[c] = points[i];
            }
        }
        centroids
    }
}

fn assign(points: &[Coord], centroids: &[Coord]) -> Vec<usize> {
    points
        .iter()
        .map(|p| nearest_index(centroids, p).unwrap_or(0))
        .collect()
}

fn squared(x: f64) -> f64 {
    x * x
}
