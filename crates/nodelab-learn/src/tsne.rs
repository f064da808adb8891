//! Exact t-SNE for looking at embeddings in two or three dimensions.

use crate::{Error, Result};
use ndarray::{Array2, ArrayView2};
use nodelab_core::load_embeddings;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::Path;
use std::time::Instant;

/// t-SNE settings.
#[derive(Debug, Clone)]
pub struct TsneConfig {
    /// Output dimensions (default: 2).
    pub n_components: usize,
    /// Effective neighbour count (default: 30).
    pub perplexity: f64,
    /// P multiplier during the first 250 iterations (default: 12).
    pub early_exaggeration: f64,
    /// Gradient step (default: 200).
    pub learning_rate: f64,
    /// Total iterations (default: 1000).
    pub n_iter: usize,
    /// Seed for the initial layout (default: 0).
    pub seed: u64,
}

impl Default for TsneConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            perplexity: 30.0,
            early_exaggeration: 12.0,
            learning_rate: 200.0,
            n_iter: 1000,
            seed: 0,
        }
    }
}

impl TsneConfig {
    pub fn with_n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    pub fn with_perplexity(mut self, perplexity: f64) -> Self {
        self.perplexity = perplexity;
        self
    }

    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

const EXAGGERATION_ITERS: usize = 250;
const MIN_GAIN: f64 = 0.01;
const INIT_STD: f64 = 1e-4;

fn squared_distances(x: ArrayView2<'_, f32>) -> Array2<f64> {
    let n = x.nrows();
    let mut d = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let s: f64 = x
                .row(i)
                .iter()
                .zip(x.row(j))
                .map(|(&a, &b)| (f64::from(a) - f64::from(b)).powi(2))
                .sum();
            d[[i, j]] = s;
            d[[j, i]] = s;
        }
    }
    d
}

/// Row `i` of the conditional P, with beta found by bisection on entropy.
fn conditional_row(d: &Array2<f64>, i: usize, target_entropy: f64, out: &mut [f64]) {
    let n = d.nrows();
    let (mut beta, mut lo, mut hi) = (1.0, f64::NEG_INFINITY, f64::INFINITY);

    for _ in 0..100 {
        let mut sum = 0.0;
        for j in 0..n {
            out[j] = if j == i { 0.0 } else { (-d[[i, j]] * beta).exp() };
            sum += out[j];
        }
        let sum = sum.max(f64::MIN_POSITIVE);
        let mut entropy = 0.0;
        for j in 0..n {
            out[j] /= sum;
            if out[j] > 0.0 {
                entropy -= out[j] * out[j].ln();
            }
        }

        let diff = entropy - target_entropy;
        if diff.abs() < 1e-5 {
            break;
        }
        // too flat -> sharpen
        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_infinite() { beta * 2.0 } else { (beta + hi) / 2.0 };
        } else {
            hi = beta;
            beta = if lo.is_infinite() { beta / 2.0 } else { (beta + lo) / 2.0 };
        }
    }
}

fn joint_probabilities(x: ArrayView2<'_, f32>, perplexity: f64) -> Array2<f64> {
    let n = x.nrows();
    let d = squared_distances(x);
    let target = perplexity.ln();

    let mut p = Array2::<f64>::zeros((n, n));
    let mut row = vec![0.0; n];
    for i in 0..n {
        conditional_row(&d, i, target, &mut row);
        for (j, &v) in row.iter().enumerate() {
            p[[i, j]] = v;
        }
    }
    let sym = (&p + &p.t()) / (2.0 * n as f64);
    sym.mapv(|v| v.max(1e-12))
}

/// Zero-mean Gaussian draws with standard deviation `std`.
fn gaussian_layout(n: usize, dims: usize, std: f64, seed: u64) -> Result<Array2<f64>> {
    let normal = Normal::new(0.0, std)
        .map_err(|e| Error::InvalidConfig(format!("initial layout: {e}")))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(Array2::from_shape_simple_fn((n, dims), || normal.sample(&mut rng)))
}

/// Embed the rows of `x` into `cfg.n_components` dimensions.
pub fn tsne(x: ArrayView2<'_, f32>, cfg: &TsneConfig) -> Result<Array2<f64>> {
    let n = x.nrows();
    if cfg.n_components == 0 {
        return Err(Error::InvalidConfig("n_components must be positive".into()));
    }
    if !(cfg.perplexity > 0.0) || cfg.perplexity >= n as f64 {
        return Err(Error::InvalidConfig(format!(
            "perplexity must be in (0, {n}), got {}",
            cfg.perplexity
        )));
    }

    let p = joint_probabilities(x, cfg.perplexity);
    let dims = cfg.n_components;
    let mut y = gaussian_layout(n, dims, INIT_STD, cfg.seed)?;
    let mut update = Array2::<f64>::zeros((n, dims));
    let mut gains = Array2::<f64>::ones((n, dims));
    let mut num = Array2::<f64>::zeros((n, n));
    let mut grad = Array2::<f64>::zeros((n, dims));

    for iter in 0..cfg.n_iter {
        let (exaggeration, momentum) = if iter < EXAGGERATION_ITERS {
            (cfg.early_exaggeration, 0.5)
        } else {
            (1.0, 0.8)
        };

        // Student-t kernel
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let d2: f64 = y.row(i).iter().zip(y.row(j)).map(|(a, b)| (a - b).powi(2)).sum();
                let v = 1.0 / (1.0 + d2);
                num[[i, j]] = v;
                num[[j, i]] = v;
                total += 2.0 * v;
            }
        }
        let total = total.max(f64::MIN_POSITIVE);

        grad.fill(0.0);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[[i, j]] / total).max(1e-12);
                let coeff = 4.0 * (exaggeration * p[[i, j]] - q) * num[[i, j]];
                for k in 0..dims {
                    grad[[i, k]] += coeff * (y[[i, k]] - y[[j, k]]);
                }
            }
        }

        for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
            *gain = if g.signum() != u.signum() {
                *gain + 0.2
            } else {
                (*gain * 0.8).max(MIN_GAIN)
            };
            *u = momentum * *u - cfg.learning_rate * *gain * g;
        }
        y += &update;

        let mean = y.mean_axis(ndarray::Axis(0));
        if let Some(mean) = mean {
            y -= &mean;
        }
    }
    Ok(y)
}

/// Run t-SNE on an embedding file and write the layout as CSV.
///
/// Columns are `x,y` (plus `z` for three components) and, when colours are
/// given, `color`. Returns the layout.
pub fn tsne_visualization(
    emb_file: impl AsRef<Path>,
    colors: Option<&[String]>,
    out: impl AsRef<Path>,
    cfg: &TsneConfig,
) -> Result<Array2<f64>> {
    let emb = load_embeddings(emb_file)?;
    if let Some(colors) = colors {
        if colors.len() != emb.nrows() {
            return Err(Error::ShapeMismatch(format!(
                "{} colours for {} embedding rows",
                colors.len(),
                emb.nrows()
            )));
        }
    }

    let t0 = Instant::now();
    let layout = tsne(emb.view(), cfg)?;
    println!("t-SNE: {:.2} sec", t0.elapsed().as_secs_f64());

    let mut writer = csv::Writer::from_path(out)?;
    let mut header: Vec<String> = ["x", "y", "z"]
        .iter()
        .map(|s| s.to_string())
        .chain((3..cfg.n_components).map(|k| format!("c{k}")))
        .take(cfg.n_components)
        .collect();
    if colors.is_some() {
        header.push("color".to_string());
    }
    writer.write_record(&header)?;

    for (i, row) in layout.rows().into_iter().enumerate() {
        let mut record: Vec<String> = row.iter().map(f64::to_string).collect();
        if let Some(colors) = colors {
            record.push(colors[i].clone());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_clusters() -> Array2<f32> {
        Array2::from_shape_fn((20, 3), |(i, j)| {
            let base = if i < 10 { 0.0 } else { 50.0 };
            base + ((i * 7 + j * 3) % 5) as f32 * 0.1
        })
    }

    fn centroid(y: &Array2<f64>, rows: std::ops::Range<usize>) -> Vec<f64> {
        let n = rows.len() as f64;
        (0..y.ncols())
            .map(|k| rows.clone().map(|i| y[[i, k]]).sum::<f64>() / n)
            .collect()
    }

    #[test]
    fn test_clusters_stay_apart() {
        let x = two_clusters();
        let cfg = TsneConfig::default().with_perplexity(5.0).with_n_iter(400);
        let y = tsne(x.view(), &cfg).unwrap();
        assert_eq!(y.dim(), (20, 2));

        let (a, b) = (centroid(&y, 0..10), centroid(&y, 10..20));
        let between: f64 = a.iter().zip(&b).map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt();
        let spread = (0..10)
            .map(|i| {
                (0..2)
                    .map(|k| (y[[i, k]] - a[k]).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max);
        assert!(between > spread);
    }

    #[test]
    fn test_seeded_layout_is_deterministic() {
        let x = two_clusters();
        let cfg = TsneConfig::default().with_perplexity(5.0).with_n_iter(50);
        assert_eq!(tsne(x.view(), &cfg).unwrap(), tsne(x.view(), &cfg).unwrap());
    }

    #[test]
    fn test_initial_layout_scale() {
        let y = gaussian_layout(500, 2, INIT_STD, 7).unwrap();
        let mean = y.mean().unwrap();
        let var = y.mapv(|v| (v - mean).powi(2)).mean().unwrap();
        assert!(mean.abs() < 2e-5);
        assert!((var.sqrt() / INIT_STD - 1.0).abs() < 0.1);
        assert_eq!(y, gaussian_layout(500, 2, INIT_STD, 7).unwrap());
    }

    #[test]
    fn test_perplexity_bounds() {
        let x = two_clusters();
        assert!(tsne(x.view(), &TsneConfig::default()).is_err());
    }

    #[test]
    fn test_visualization_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let emb = dir.path().join("toy.emb");
        let mut text = String::from("6 2\n");
        for i in 0..6 {
            text.push_str(&format!("{i} {} {}\n", i % 2, i));
        }
        std::fs::write(&emb, text).unwrap();

        let colors: Vec<String> = (0..6).map(|i| (i % 2).to_string()).collect();
        let out = dir.path().join("layout.csv");
        let cfg = TsneConfig::default().with_perplexity(2.0).with_n_iter(20);
        tsne_visualization(&emb, Some(colors.as_slice()), &out, &cfg).unwrap();

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["x", "y", "color"]);
        assert_eq!(reader.records().count(), 6);
    }
}
