// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Lookup tables of the standard normal log-CDF and log-survival function.

use std::f64::consts::{PI, SQRT_2};
use std::path::Path;

use anyhow::Result;
use itertools::Itertools;
use statrs::function::erf::erfc;

use crate::data;
use crate::errors::Error;
use crate::utils;

/// Half-width of the generated z grid.
pub const Z_MAX: f64 = 38.5;
/// Resolution of the generated z grid.
pub const Z_STEP: f64 = 1e-3;

// below this, erfc loses too much relative precision
const ASYMPTOTIC_THRESHOLD: f64 = -20.0;

/// Parallel tables `(z, ln Φ(z), ln (1 - Φ(z)))` over an increasing z grid.
/// Lookups interpolate linearly and clamp to the boundary values outside of
/// the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalTables {
    z: Vec<f64>,
    ln_cdf: Vec<f64>,
    ln_sf: Vec<f64>,
}

impl NormalTables {
    pub fn new(z: Vec<f64>, ln_cdf: Vec<f64>, ln_sf: Vec<f64>) -> Result<Self> {
        if z.len() < 2 || z.len() != ln_cdf.len() || z.len() != ln_sf.len() {
            return Err(Error::InvalidTable {
                msg: format!(
                    "tables need at least 2 entries of equal length, found {}, {} and {}",
                    z.len(),
                    ln_cdf.len(),
                    ln_sf.len()
                ),
            }
            .into());
        }
        if z.iter().tuple_windows().any(|(a, b)| !(a < b)) {
            return Err(Error::InvalidTable {
                msg: "z values have to be strictly increasing".to_owned(),
            }
            .into());
        }
        if ln_cdf.iter().chain(ln_sf.iter()).any(|v| v.is_nan() || *v > 0.0) {
            return Err(Error::InvalidTable {
                msg: "log probabilities have to be at most 0".to_owned(),
            }
            .into());
        }
        Ok(NormalTables { z, ln_cdf, ln_sf })
    }

    /// Tables over `[-Z_MAX, Z_MAX]` with step `Z_STEP`.
    pub fn standard() -> Self {
        Self::generate(Z_MAX, Z_STEP)
    }

    pub fn generate(z_max: f64, step: f64) -> Self {
        let n = (2.0 * z_max / step).round() as usize + 1;
        let z: Vec<f64> = (0..n).map(|i| -z_max + i as f64 * step).collect();
        let ln_cdf = z.iter().map(|z| ln_normal_cdf(*z)).collect();
        let ln_sf = z.iter().map(|z| ln_normal_cdf(-z)).collect();
        NormalTables { z, ln_cdf, ln_sf }
    }

    /// Load three whitespace-delimited tables of equal length.
    pub fn from_files<P: AsRef<Path>>(z: P, ln_cdf: P, ln_sf: P) -> Result<Self> {
        let read = |path: P| -> Result<Vec<f64>> {
            Ok(data::read_table(path, 0, 0)?.into_iter().flatten().collect())
        };
        Self::new(read(z)?, read(ln_cdf)?, read(ln_sf)?)
    }

    pub fn len(&self) -> usize {
        self.z.len()
    }

    /// ln Φ(z)
    pub fn ln_cdf(&self, z: f64) -> f64 {
        utils::interp(z, &self.z, &self.ln_cdf)
    }

    /// ln (1 - Φ(z))
    pub fn ln_sf(&self, z: f64) -> f64 {
        utils::interp(z, &self.z, &self.ln_sf)
    }
}

/// ln Φ(z), using the asymptotic expansion of Mills' ratio in the far lower
/// tail.
pub fn ln_normal_cdf(z: f64) -> f64 {
    if z >= ASYMPTOTIC_THRESHOLD {
        (0.5 * erfc(-z / SQRT_2)).ln()
    } else {
        let z2 = z * z;
        let series = 1.0 - 1.0 / z2 + 3.0 / z2.powi(2) - 15.0 / z2.powi(3) + 105.0 / z2.powi(4);
        -0.5 * z2 - 0.5 * (2.0 * PI).ln() - (-z).ln() + series.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ln_normal_cdf() {
        assert_abs_diff_eq!(ln_normal_cdf(0.0), 0.5f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(ln_normal_cdf(-1.96), -3.6889636517296385, epsilon = 1e-9);
        assert_abs_diff_eq!(ln_normal_cdf(-30.0), -454.32124395634156, epsilon = 1e-8);
        // both branches agree at the threshold
        assert_abs_diff_eq!(
            ln_normal_cdf(-20.0),
            ln_normal_cdf(-20.0 - 1e-12),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_lookup() {
        let tables = NormalTables::standard();
        assert_eq!(tables.len(), 77001);
        assert_abs_diff_eq!(tables.ln_cdf(0.0), 0.5f64.ln(), epsilon = 1e-7);
        assert_abs_diff_eq!(tables.ln_sf(1.96), -0.025315649164282163, epsilon = 1e-6);
        assert_abs_diff_eq!(tables.ln_cdf(-1.96), tables.ln_sf(1.96), epsilon = 1e-7);
        // clamped outside of the grid
        assert_eq!(tables.ln_cdf(-100.0), tables.ln_cdf(-Z_MAX));
        assert_eq!(tables.ln_sf(100.0), tables.ln_sf(Z_MAX));
        assert_eq!(tables.ln_cdf(100.0), tables.ln_cdf(Z_MAX));
    }

    #[test]
    fn test_invalid_tables() {
        assert!(NormalTables::new(vec![0.0], vec![-1.0], vec![-1.0]).is_err());
        assert!(NormalTables::new(vec![1.0, 0.0], vec![-1.0, -1.0], vec![-1.0, -1.0]).is_err());
        assert!(NormalTables::new(vec![0.0, 1.0], vec![-1.0, 0.5], vec![-1.0, -1.0]).is_err());
        assert!(NormalTables::new(vec![0.0, 1.0], vec![-1.0, -0.5], vec![-1.0, -1.0]).is_ok());
    }
}
