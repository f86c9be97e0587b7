//! Derivative-free minimization for likelihood fitting.

/// Nelder–Mead simplex search settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NelderMead {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-9,
        }
    }
}

impl NelderMead {
    /// Minimize `f` from `start`, with initial simplex offsets `step`.
    ///
    /// Non-finite objective values are treated as `+inf`.
    pub fn minimize<F>(&self, f: F, start: &[f64], step: &[f64]) -> (Vec<f64>, f64)
    where
        F: Fn(&[f64]) -> f64,
    {
        let dim = start.len();
        let eval = |x: &[f64]| {
            let v = f(x);
            if v.is_finite() { v } else { f64::INFINITY }
        };

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
        simplex.push((start.to_vec(), eval(start)));
        for i in 0..dim {
            let mut vertex = start.to_vec();
            vertex[i] += step.get(i).copied().unwrap_or(0.1);
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        for _ in 0..self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[dim].1;
            if best.is_finite()
                && worst.is_finite()
                && (worst - best).abs() <= self.tolerance * (best.abs() + self.tolerance)
            {
                break;
            }

            let centroid: Vec<f64> = (0..dim)
                .map(|j| simplex[..dim].iter().map(|(v, _)| v[j]).sum::<f64>() / dim as f64)
                .collect();
            let toward = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[dim].0)
                    .map(|(c, w)| c + t * (w - c))
                    .collect()
            };

            let reflected = toward(-1.0);
            let f_reflected = eval(&reflected);

            if f_reflected < simplex[0].1 {
                let expanded = toward(-2.0);
                let f_expanded = eval(&expanded);
                simplex[dim] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }
            if f_reflected < simplex[dim - 1].1 {
                simplex[dim] = (reflected, f_reflected);
                continue;
            }

            let contracted = if f_reflected < simplex[dim].1 {
                toward(-0.5)
            } else {
                toward(0.5)
            };
            let f_contracted = eval(&contracted);
            if f_contracted < simplex[dim].1.min(f_reflected) {
                simplex[dim] = (contracted, f_contracted);
                continue;
            }

            // Shrink toward the best vertex.
            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                for (x, a) in vertex.0.iter_mut().zip(&anchor) {
                    *x = a + 0.5 * (*x - a);
                }
                vertex.1 = eval(&vertex.0);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (x, value) = simplex.swap_remove(0);
        (x, value)
    }
}
