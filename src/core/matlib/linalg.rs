/// Gaussian elimination with partial pivoting for a dense n x n system.
pub fn gauss_elimination(a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>, String> {
    if a.len() != n * n || b.len() != n {
        return Err(format!(
            "Dimension mismatch: matrix has {} entries, rhs has {}, n={}",
            a.len(),
            b.len(),
            n
        ));
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();

    // Forward elimination
    for col in 0..n {
        let mut max_row = col;
        for row in (col + 1)..n {
            if a[row * n + col].abs() > a[max_row * n + col].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..n {
                a.swap(col * n + j, max_row * n + j);
            }
            b.swap(col, max_row);
        }

        if a[col * n + col].abs() < 1e-15 {
            return Err("Matrix is singular".to_string());
        }

        for row in (col + 1)..n {
            let factor = a[row * n + col] / a[col * n + col];
            for j in col..n {
                a[row * n + j] -= factor * a[col * n + j];
            }
            b[row] -= factor * b[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        x[i] = b[i];
        for j in (i + 1)..n {
            x[i] -= a[i * n + j] * x[j];
        }
        x[i] /= a[i * n + i];
    }

    Ok(x)
}

/// Solve the (optionally weighted, optionally ridge-penalized) normal equations
///
///   (A' W A + diag(ridge)) x = A' W b
///
/// `a_matrix` is row-major `nrows x ncols`. `ridge` holds one penalty per
/// column so an intercept column can be left unpenalized.
pub fn solve_normal_equations(
    a_matrix: &[f64],
    b_vector: &[f64],
    weights: Option<&[f64]>,
    ridge: &[f64],
    nrows: usize,
    ncols: usize,
) -> Result<Vec<f64>, String> {
    if a_matrix.len() != nrows * ncols || b_vector.len() != nrows || ridge.len() != ncols {
        return Err("Dimension mismatch in normal equations".to_string());
    }
    if let Some(w) = weights
        && w.len() != nrows
    {
        return Err("Weight vector length does not match rows".to_string());
    }

    let mut ata = vec![0.0; ncols * ncols];
    let mut atb = vec![0.0; ncols];

    for k in 0..nrows {
        let wk = weights.map_or(1.0, |w| w[k]);
        let row = &a_matrix[k * ncols..(k + 1) * ncols];
        for i in 0..ncols {
            let wi = wk * row[i];
            atb[i] += wi * b_vector[k];
            for j in i..ncols {
                ata[i * ncols + j] += wi * row[j];
            }
        }
    }

    for i in 0..ncols {
        for j in 0..i {
            ata[i * ncols + j] = ata[j * ncols + i];
        }
        ata[i * ncols + i] += ridge[i];
    }

    gauss_elimination(&ata, &atb, ncols)
}
