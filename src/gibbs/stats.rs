//! Summary statistics and histogram binning of a finished trace.

use super::sampler::SampleTrace;
use super::Bounds;
use serde::Serialize;
use serde_json::{json, Value};

/// Summary of a trace. `std_*` are population standard deviations; a trace
/// with zero variance on either axis has a NaN `correlation`, which
/// serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStatistics {
    pub mean_x: f64,
    pub mean_y: f64,
    pub std_x: f64,
    pub std_y: f64,
    pub correlation: f64,
    /// Seconds spent selecting inverses and sampling.
    pub execution_time: f64,
    pub total_samples: usize,
}

impl SampleStatistics {
    pub fn from_trace(trace: &SampleTrace, execution_time: f64) -> Self {
        let (mean_x, std_x) = mean_and_std(&trace.x);
        let (mean_y, std_y) = mean_and_std(&trace.y);
        SampleStatistics {
            mean_x,
            mean_y,
            std_x,
            std_y,
            correlation: pearson(&trace.x, &trace.y, mean_x, mean_y),
            execution_time,
            total_samples: trace.len(),
        }
    }
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn pearson(xs: &[f64], ys: &[f64], mean_x: f64, mean_y: f64) -> f64 {
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Equal-width 2-D histogram over the declared bounds.
///
/// `x_centers` and `y_centers` are meshgrids and `counts` is indexed
/// `[row][col]` with rows along `y` and columns along `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramGrid {
    pub x_centers: Vec<Vec<f64>>,
    pub y_centers: Vec<Vec<f64>>,
    pub counts: Vec<Vec<u64>>,
}

impl HistogramGrid {
    /// Bin `xs`/`ys` into `bins × bins` cells. The last bin on each axis
    /// includes its right edge; points outside the bounds are skipped.
    pub fn from_samples(
        xs: &[f64],
        ys: &[f64],
        x_bounds: &Bounds,
        y_bounds: &Bounds,
        bins: usize,
    ) -> Self {
        let bins = bins.max(1);
        let x_mid = bin_centers(x_bounds, bins);
        let y_mid = bin_centers(y_bounds, bins);

        let mut counts = vec![vec![0u64; bins]; bins];
        for (&x, &y) in xs.iter().zip(ys) {
            let cell = (bin_index(x, x_bounds, bins), bin_index(y, y_bounds, bins));
            if let (Some(col), Some(row)) = cell {
                counts[row][col] += 1;
            }
        }

        HistogramGrid {
            x_centers: vec![x_mid.clone(); bins],
            y_centers: y_mid.iter().map(|&y| vec![y; bins]).collect(),
            counts,
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

fn bin_centers(bounds: &Bounds, bins: usize) -> Vec<f64> {
    let width = bounds.width() / bins as f64;
    (0..bins)
        .map(|i| bounds.min + width * (i as f64 + 0.5))
        .collect()
}

fn bin_index(value: f64, bounds: &Bounds, bins: usize) -> Option<usize> {
    if !bounds.contains(value) || bounds.width() <= 0.0 {
        return None;
    }
    let scaled = (value - bounds.min) / bounds.width() * bins as f64;
    Some((scaled.floor() as usize).min(bins - 1))
}

/// Scatter and surface traces plus layouts, in the shape the plotting
/// front-end consumes.
pub fn plot_data(trace: &SampleTrace, grid: &HistogramGrid) -> Value {
    json!({
        "scatter_2d": {
            "x": trace.x,
            "y": trace.y,
            "type": "scatter",
            "mode": "markers",
            "marker": { "size": 3, "opacity": 0.6, "color": "blue" },
            "name": "Samples"
        },
        "histogram_3d": {
            "x": grid.x_centers,
            "y": grid.y_centers,
            "z": grid.counts,
            "type": "surface",
            "colorscale": "Viridis",
            "name": "Density"
        },
        "layout_2d": {
            "title": "Gibbs Samples - 2D View",
            "xaxis": { "title": "X" },
            "yaxis": { "title": "Y" }
        },
        "layout_3d": {
            "title": "Frequency Histogram - 3D View",
            "scene": {
                "xaxis": { "title": "X" },
                "yaxis": { "title": "Y" },
                "zaxis": { "title": "Frequency" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn trace(x: Vec<f64>, y: Vec<f64>) -> SampleTrace {
        SampleTrace {
            x,
            y,
            held_steps: 0,
        }
    }

    #[test]
    fn test_population_statistics() {
        let t = trace(vec![1.0, 2.0, 3.0, 4.0], vec![2.0, 4.0, 6.0, 8.0]);
        let stats = SampleStatistics::from_trace(&t, 0.5);
        assert_eq!(stats.mean_x, 2.5);
        assert_eq!(stats.mean_y, 5.0);
        assert!((stats.std_x - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((stats.correlation - 1.0).abs() < 1e-12);
        assert_eq!(stats.total_samples, 4);
        assert_eq!(stats.execution_time, 0.5);
    }

    #[test]
    fn test_zero_variance_gives_nan_correlation() {
        let t = trace(vec![0.3; 5], vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        let stats = SampleStatistics::from_trace(&t, 0.0);
        assert_eq!(stats.std_x, 0.0);
        assert!(stats.correlation.is_nan());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["correlation"], Value::Null);
    }

    #[test]
    fn test_histogram_edges() {
        let bounds = Bounds::new(0.0, 1.0);
        let xs = [0.0, 0.49, 0.5, 1.0, 1.5];
        let ys = [0.0, 0.0, 0.99, 1.0, 0.5];
        let grid = HistogramGrid::from_samples(&xs, &ys, &bounds, &bounds, 2);
        assert_eq!(grid.counts, vec![vec![2, 0], vec![0, 2]]);
        assert_eq!(grid.total(), 4);
        assert_eq!(grid.x_centers, vec![vec![0.25, 0.75], vec![0.25, 0.75]]);
        assert_eq!(grid.y_centers, vec![vec![0.25, 0.25], vec![0.75, 0.75]]);
    }

    #[test]
    fn test_histogram_rows_follow_y() {
        let bounds = Bounds::new(0.0, 1.0);
        let grid = HistogramGrid::from_samples(&[0.9], &[0.1], &bounds, &bounds, 2);
        assert_eq!(grid.counts, vec![vec![0, 1], vec![0, 0]]);
    }

    #[test]
    fn test_plot_data_shape() {
        let t = trace(vec![0.5], vec![0.5]);
        let unit = Bounds::new(0.0, 1.0);
        let grid = HistogramGrid::from_samples(&t.x, &t.y, &unit, &unit, 20);
        let plot = plot_data(&t, &grid);
        assert_eq!(plot["scatter_2d"]["type"], "scatter");
        assert_eq!(plot["histogram_3d"]["z"].as_array().unwrap().len(), 20);
        assert_eq!(plot["layout_3d"]["scene"]["zaxis"]["title"], "Frequency");
    }
}
