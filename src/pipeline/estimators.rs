//! Reference estimators registered by default

use anyhow::{anyhow, bail, ensure};
use serde_json::{Map, Value};

use super::{Capabilities, Estimator};

fn as_bool(name: &str, value: &Value) -> anyhow::Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow!("parameter '{name}' expects a bool, got {value}"))
}

fn as_f64(name: &str, value: &Value) -> anyhow::Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| anyhow!("parameter '{name}' expects a number, got {value}"))
}

/// Per-column standardization: `(x - mean) / std`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    with_mean: bool,
    with_std: bool,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
            mean: Vec::new(),
            scale: Vec::new(),
        }
    }
}

impl Estimator for StandardScaler {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            fit: true,
            fit_transform: true,
            transform: true,
            predict: false,
        }
    }

    fn set_param(&mut self, name: &str, value: &Value) -> anyhow::Result<()> {
        match name {
            "with_mean" => self.with_mean = as_bool(name, value)?,
            "with_std" => self.with_std = as_bool(name, value)?,
            other => bail!("standard_scaler has no parameter '{other}'"),
        }
        Ok(())
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("with_mean".into(), self.with_mean.into());
        params.insert("with_std".into(), self.with_std.into());
        params
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &[Vec<f64>], _y: &[f64]) -> anyhow::Result<()> {
        ensure!(!x.is_empty(), "cannot fit standard_scaler on an empty training set");
        let width = x[0].len();
        let n = x.len() as f64;

        self.mean = (0..width)
            .map(|col| x.iter().map(|row| row[col]).sum::<f64>() / n)
            .collect();
        self.scale = (0..width)
            .map(|col| {
                let mean = self.mean[col];
                let var = x.iter().map(|row| (row[col] - mean).powi(2)).sum::<f64>() / n;
                // Constant columns keep their scale.
                if var > 0.0 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();
        Ok(())
    }

    fn transform(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
        ensure!(!self.mean.is_empty() || x.is_empty(), "standard_scaler is not fitted");
        x.iter()
            .map(|row| {
                ensure!(
                    row.len() == self.mean.len(),
                    "expected {} features, got {}",
                    self.mean.len(),
                    row.len()
                );
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(col, v)| {
                        let centered = if self.with_mean { v - self.mean[col] } else { *v };
                        if self.with_std {
                            centered / self.scale[col]
                        } else {
                            centered
                        }
                    })
                    .collect())
            })
            .collect()
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            with_mean: self.with_mean,
            with_std: self.with_std,
            ..Self::default()
        })
    }
}

/// Predicts the (optionally shrunk) mean of the training targets.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    alpha: f64,
    mean: Option<f64>,
}

impl Estimator for MeanRegressor {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            fit: true,
            predict: true,
            ..Capabilities::default()
        }
    }

    fn set_param(&mut self, name: &str, value: &Value) -> anyhow::Result<()> {
        match name {
            "alpha" => {
                let alpha = as_f64(name, value)?;
                ensure!((0.0..=1.0).contains(&alpha), "alpha must be in [0, 1], got {alpha}");
                self.alpha = alpha;
            }
            other => bail!("mean_regressor has no parameter '{other}'"),
        }
        Ok(())
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("alpha".into(), self.alpha.into());
        params
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, _x: &[Vec<f64>], y: &[f64]) -> anyhow::Result<()> {
        ensure!(!y.is_empty(), "cannot fit mean_regressor on an empty training set");
        self.mean = Some(y.iter().sum::<f64>() / y.len() as f64);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        let mean = self.mean.ok_or_else(|| anyhow!("mean_regressor is not fitted"))?;
        Ok(vec![mean * (1.0 - self.alpha); x.len()])
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            alpha: self.alpha,
            mean: None,
        })
    }
}

/// Predicts the most frequent training class.
#[derive(Debug, Clone, Default)]
pub struct MajorityClassifier {
    prefer_highest: bool,
    class: Option<f64>,
}

impl Estimator for MajorityClassifier {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            fit: true,
            predict: true,
            ..Capabilities::default()
        }
    }

    fn set_param(&mut self, name: &str, value: &Value) -> anyhow::Result<()> {
        match name {
            "tie_breaker" => {
                self.prefer_highest = match value.as_str() {
                    Some("lowest") => false,
                    Some("highest") => true,
                    _ => bail!("tie_breaker must be \"lowest\" or \"highest\", got {value}"),
                };
            }
            other => bail!("majority_classifier has no parameter '{other}'"),
        }
        Ok(())
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        let tie = if self.prefer_highest { "highest" } else { "lowest" };
        params.insert("tie_breaker".into(), tie.into());
        params
    }

    fn fit(&mut self, _x: &[Vec<f64>], y: &[f64]) -> anyhow::Result<()> {
        ensure!(!y.is_empty(), "cannot fit majority_classifier on an empty training set");

        let mut classes: Vec<f64> = y.to_vec();
        classes.sort_by(f64::total_cmp);

        let mut best: Option<(f64, usize)> = None;
        let mut idx = 0;
        while idx < classes.len() {
            let class = classes[idx];
            let count = classes[idx..]
                .iter()
                .take_while(|c| c.total_cmp(&class).is_eq())
                .count();
            idx += count;
            best = match best {
                Some((_, top)) if count > top || (count == top && self.prefer_highest) => {
                    Some((class, count))
                }
                None => Some((class, count)),
                keep => keep,
            };
        }
        self.class = best.map(|(class, _)| class);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        let class = self.class.ok_or_else(|| anyhow!("majority_classifier is not fitted"))?;
        Ok(vec![class; x.len()])
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(Self {
            prefer_highest: self.prefer_highest,
            class: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scaler_standardizes_columns() {
        let mut scaler = StandardScaler::default();
        let x = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        scaler.fit(&x, &[]).unwrap();

        let out = scaler.transform(&x).unwrap();
        assert_eq!(out, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_scaler_without_mean() {
        let mut scaler = StandardScaler::default();
        scaler.set_param("with_mean", &json!(false)).unwrap();
        scaler.set_param("with_std", &json!(false)).unwrap();
        scaler.fit(&[vec![1.0], vec![3.0]], &[]).unwrap();
        assert_eq!(scaler.transform(&[vec![2.0]]).unwrap(), vec![vec![2.0]]);
    }

    #[test]
    fn test_scaler_rejects_wrong_type() {
        let mut scaler = StandardScaler::default();
        assert!(scaler.set_param("with_mean", &json!("yes")).is_err());
        assert!(scaler.set_param("gamma", &json!(1)).is_err());
    }

    #[test]
    fn test_mean_regressor_shrinks() {
        let mut reg = MeanRegressor::default();
        reg.set_param("alpha", &json!(0.5)).unwrap();
        reg.fit(&[vec![0.0], vec![0.0]], &[2.0, 4.0]).unwrap();
        assert_eq!(reg.predict(&[vec![1.0]]).unwrap(), vec![1.5]);
    }

    #[test]
    fn test_mean_regressor_rejects_alpha_out_of_range() {
        let mut reg = MeanRegressor::default();
        assert!(reg.set_param("alpha", &json!(2.0)).is_err());
    }

    #[test]
    fn test_majority_tie_breaker() {
        let y = [0.0, 1.0, 0.0, 1.0, 2.0];
        let x = vec![vec![0.0]; y.len()];

        let mut low = MajorityClassifier::default();
        low.fit(&x, &y).unwrap();
        assert_eq!(low.predict(&[vec![0.0]]).unwrap(), vec![0.0]);

        let mut high = MajorityClassifier::default();
        high.set_param("tie_breaker", &json!("highest")).unwrap();
        high.fit(&x, &y).unwrap();
        assert_eq!(high.predict(&[vec![0.0]]).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_predict_before_fit_fails() {
        assert!(MajorityClassifier::default().predict(&[vec![0.0]]).is_err());
        assert!(MeanRegressor::default().predict(&[vec![0.0]]).is_err());
    }

    #[test]
    fn test_box_clone_drops_fitted_state() {
        let mut reg = MeanRegressor::default();
        reg.fit(&[vec![0.0]], &[1.0]).unwrap();
        let fresh = reg.box_clone();
        assert!(fresh.predict(&[vec![0.0]]).is_err());
    }
}
