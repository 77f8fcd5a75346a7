//! Derivative-free minimization (Nelder–Mead simplex).

/// Stopping rules for [`minimize`].
#[derive(Debug, Clone, Copy)]
pub struct SimplexOptions {
    pub max_iterations: usize,
    /// Stop once the spread of objective values across the simplex falls
    /// below this.
    pub tolerance: f64,
    /// Initial step along each axis.
    pub step: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            step: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

fn eval<F: Fn(&[f64]) -> f64>(f: &F, x: &[f64]) -> f64 {
    let v = f(x);
    if v.is_finite() {
        v
    } else {
        f64::INFINITY
    }
}

/// Minimize `f` starting from `start`.
///
/// Non-finite objective values are treated as `+inf`, so the simplex
/// retreats from regions where the objective is undefined.
pub fn minimize<F: Fn(&[f64]) -> f64>(f: F, start: &[f64], options: SimplexOptions) -> Minimum {
    let dim = start.len();
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(start.to_vec());
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += options.step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| eval(&f, x)).collect();

    let mut iterations = 0;
    while iterations < options.max_iterations {
        iterations += 1;

        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[dim];
        if (worst - best).abs() <= options.tolerance {
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|v| v[j]).sum::<f64>() / dim as f64)
            .collect();
        let toward = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[dim])
                .map(|(c, w)| c + t * (w - c))
                .collect()
        };

        let reflected = toward(-1.0);
        let fr = eval(&f, &reflected);

        if fr < best {
            let expanded = toward(-2.0);
            let fe = eval(&f, &expanded);
            if fe < fr {
                simplex[dim] = expanded;
                values[dim] = fe;
            } else {
                simplex[dim] = reflected;
                values[dim] = fr;
            }
            continue;
        }

        if fr < values[dim - 1] {
            simplex[dim] = reflected;
            values[dim] = fr;
            continue;
        }

        let (contracted, fc) = if fr < worst {
            let c = toward(-0.5);
            let v = eval(&f, &c);
            (c, v)
        } else {
            let c = toward(0.5);
            let v = eval(&f, &c);
            (c, v)
        };

        if fc < worst.min(fr) {
            simplex[dim] = contracted;
            values[dim] = fc;
            continue;
        }

        // Shrink toward the best vertex.
        let anchor = simplex[0].clone();
        for i in 1..=dim {
            simplex[i] = anchor
                .iter()
                .zip(&simplex[i])
                .map(|(a, x)| a + 0.5 * (x - a))
                .collect();
            values[i] = eval(&f, &simplex[i]);
        }
    }

    let (best_idx, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .unwrap_or((0, &f64::INFINITY));

    Minimum {
        x: simplex[best_idx].clone(),
        value: values[best_idx],
        iterations,
    }
}
