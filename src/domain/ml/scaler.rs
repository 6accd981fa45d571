use ndarray::{Array2, Axis};

/// Per-column min-max scaler mapping observed values onto `[0, 1]`.
///
/// Parameters are fitted on whatever batch is passed to [`MinMaxScaler::fit`];
/// nothing is persisted, so values scaled from different batches are not
/// comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fits per-column bounds. An empty matrix yields empty bounds.
    pub fn fit(data: &Array2<f64>) -> Self {
        let (min, max) = data
            .axis_iter(Axis(1))
            .map(|column| {
                column.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                })
            })
            .unzip();
        Self { min, max }
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Scales `data` with the fitted bounds.
    ///
    /// Constant columns have zero range and map to 0.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut scaled = data.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let lo = self.min.get(j).copied().unwrap_or(0.0);
            let range = self.max.get(j).copied().unwrap_or(0.0) - lo;
            let range = if range > 0.0 { range } else { 1.0 };
            column.mapv_inplace(|v| (v - lo) / range);
        }
        scaled
    }

    pub fn fit_transform(data: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(data);
        let scaled = scaler.transform(data);
        (scaler, scaled)
    }
}
