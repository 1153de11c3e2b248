// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Derivative-free simplex minimization (Nelder and Mead, 1965), with the
//! standard coefficients for reflection (1), expansion (2), contraction (1/2)
//! and shrinkage (1/2).

use itertools::Itertools;

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Stopping criteria. Iterations and function evaluations default to
/// `200 × dimension` each.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Absolute tolerance on the parameters of the simplex vertices.
    pub xatol: f64,
    /// Absolute tolerance on the function values of the simplex vertices.
    pub fatol: f64,
    pub max_iter: Option<usize>,
    pub max_fev: Option<usize>,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        NelderMeadOptions {
            xatol: 1e-4,
            fatol: 1e-4,
            max_iter: None,
            max_fev: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Minimum {
    #[getset(get = "pub")]
    x: Vec<f64>,
    #[getset(get_copy = "pub")]
    value: f64,
    #[getset(get_copy = "pub")]
    iterations: usize,
    #[getset(get_copy = "pub")]
    evaluations: usize,
    /// Whether the tolerances were met before running out of iterations or
    /// evaluations.
    #[getset(get_copy = "pub")]
    converged: bool,
}

/// Initial simplex for `dim` parameters around the origin. For one
/// parameter, the vertices are ±0.05. Otherwise, vertex `i < dim` is +0.01 in
/// dimension `i` and -0.01 elsewhere, and the last vertex is +0.01
/// everywhere.
pub fn initial_simplex(dim: usize) -> Vec<Vec<f64>> {
    assert!(dim > 0, "bug: simplex needs at least one dimension");
    if dim == 1 {
        return vec![vec![-0.05], vec![0.05]];
    }
    let mut simplex = (0..dim)
        .map(|i| {
            let mut vertex = vec![-0.01; dim];
            vertex[i] = 0.01;
            vertex
        })
        .collect_vec();
    simplex.push(vec![0.01; dim]);
    simplex
}

fn affine(a: &[f64], wa: f64, b: &[f64], wb: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(a, b)| wa * a + wb * b).collect()
}

#[derive(Debug, Clone, Copy, Default, new)]
pub struct NelderMead {
    options: NelderMeadOptions,
}

impl NelderMead {
    /// Minimize `f` starting from the given simplex of `dim + 1` vertices.
    /// NaN function values are treated as +∞.
    pub fn minimize<F>(&self, mut f: F, simplex: Vec<Vec<f64>>) -> Minimum
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = simplex.len() - 1;
        assert!(
            n > 0 && simplex.iter().all(|v| v.len() == n),
            "bug: simplex needs dim + 1 vertices of dimension dim"
        );
        let max_iter = self.options.max_iter.unwrap_or(200 * n);
        let max_fev = self.options.max_fev.unwrap_or(200 * n);

        let mut evaluations = 0;
        let mut eval = |x: &[f64], evaluations: &mut usize| {
            *evaluations += 1;
            let value = f(x);
            if value.is_nan() {
                f64::INFINITY
            } else {
                value
            }
        };

        let mut vertices = simplex
            .into_iter()
            .map(|x| {
                let value = eval(&x, &mut evaluations);
                (x, value)
            })
            .collect_vec();
        vertices.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut iterations = 1;
        let mut converged = false;
        loop {
            let (best, best_value) = (&vertices[0].0, vertices[0].1);
            let x_spread = vertices[1..]
                .iter()
                .flat_map(|(x, _)| x.iter().zip(best).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            let f_spread = vertices[1..]
                .iter()
                .map(|(_, value)| (best_value - value).abs())
                .fold(0.0, f64::max);
            if x_spread <= self.options.xatol && f_spread <= self.options.fatol {
                converged = true;
                break;
            }
            if iterations >= max_iter || evaluations >= max_fev {
                break;
            }

            let centroid = (0..n)
                .map(|d| vertices[..n].iter().map(|(x, _)| x[d]).sum::<f64>() / n as f64)
                .collect_vec();
            let (worst, worst_value) = vertices[n].clone();
            let second_worst_value = vertices[n - 1].1;

            let reflected = affine(&centroid, 1.0 + RHO, &worst, -RHO);
            let reflected_value = eval(&reflected, &mut evaluations);

            let mut shrink = false;
            if reflected_value < best_value {
                let expanded = affine(&centroid, 1.0 + RHO * CHI, &worst, -RHO * CHI);
                let expanded_value = eval(&expanded, &mut evaluations);
                vertices[n] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
            } else if reflected_value < second_worst_value {
                vertices[n] = (reflected, reflected_value);
            } else if reflected_value < worst_value {
                let contracted = affine(&centroid, 1.0 + PSI * RHO, &worst, -PSI * RHO);
                let contracted_value = eval(&contracted, &mut evaluations);
                if contracted_value <= reflected_value {
                    vertices[n] = (contracted, contracted_value);
                } else {
                    shrink = true;
                }
            } else {
                let contracted = affine(&centroid, 1.0 - PSI, &worst, PSI);
                let contracted_value = eval(&contracted, &mut evaluations);
                if contracted_value < worst_value {
                    vertices[n] = (contracted, contracted_value);
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = vertices[0].0.clone();
                for vertex in vertices[1..].iter_mut() {
                    let x = affine(&best, 1.0 - SIGMA, &vertex.0, SIGMA);
                    let value = eval(&x, &mut evaluations);
                    *vertex = (x, value);
                }
            }

            vertices.sort_by(|a, b| a.1.total_cmp(&b.1));
            iterations += 1;
        }

        let (x, value) = vertices.swap_remove(0);
        Minimum {
            x,
            value,
            iterations,
            evaluations,
            converged,
        }
    }
}
