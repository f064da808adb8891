//! Per-feature value binning for histogram split search.

use ndarray::ArrayView2;

/// Bin upper bounds for one feature. Bin `b` holds values `v` with
/// `bounds[b - 1] < v <= bounds[b]`; the last bin is open-ended.
#[derive(Debug, Clone)]
pub(crate) struct FeatureBins {
    bounds: Vec<f32>,
}

impl FeatureBins {
    /// Build bounds from a column, at most `max_bin` bins.
    pub(crate) fn fit(column: impl Iterator<Item = f32>, max_bin: usize) -> Self {
        let mut distinct: Vec<f32> = column.filter(|v| !v.is_nan()).collect();
        distinct.sort_by(f32::total_cmp);
        distinct.dedup();

        let n = distinct.len();
        let mut bounds = Vec::new();
        if n <= max_bin {
            for w in distinct.windows(2) {
                bounds.push(midpoint(w[0], w[1]));
            }
        } else {
            for b in 1..max_bin {
                let cut = b * n / max_bin;
                let bound = midpoint(distinct[cut - 1], distinct[cut]);
                if bounds.last().map_or(true, |&last| bound > last) {
                    bounds.push(bound);
                }
            }
        }
        Self { bounds }
    }

    pub(crate) fn n_bins(&self) -> usize {
        self.bounds.len() + 1
    }

    pub(crate) fn bin(&self, v: f32) -> u16 {
        self.bounds.partition_point(|&t| v > t) as u16
    }

    /// Split threshold for "bin <= b goes left".
    pub(crate) fn threshold(&self, b: usize) -> f32 {
        self.bounds[b]
    }
}

fn midpoint(a: f32, b: f32) -> f32 {
    a + (b - a) / 2.0
}

/// Column-major binned copy of a feature matrix.
#[derive(Debug, Clone)]
pub(crate) struct BinnedMatrix {
    pub(crate) features: Vec<FeatureBins>,
    /// `columns[f][row]`
    pub(crate) columns: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub(crate) fn build(x: ArrayView2<'_, f32>, max_bin: usize) -> Self {
        let mut features = Vec::with_capacity(x.ncols());
        let mut columns = Vec::with_capacity(x.ncols());
        for col in x.columns() {
            let bins = FeatureBins::fit(col.iter().copied(), max_bin);
            columns.push(col.iter().map(|&v| bins.bin(v)).collect());
            features.push(bins);
        }
        Self { features, columns }
    }
}
