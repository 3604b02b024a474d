//! Numeric Cholesky factorization and triangular solves.

use crate::error::{SolverError, SolverResult};
use crate::ordering::SparseMatrix;

impl SparseMatrix {
    /// Factor `A = L Lᵀ` in place and solve `A x = rhs`.
    ///
    /// `diag` and `rhs` are indexed by matrix row, `off_diag` by coefficient
    /// slot (fill-in slots zeroed). On success `rhs` holds the solution; `diag`
    /// and `off_diag` hold the factor. A non-positive pivot yields
    /// [`SolverError::IllConditioned`] with the 1-based row that failed.
    pub fn factor_and_solve(
        &mut self,
        diag: &mut [f64],
        off_diag: &mut [f64],
        rhs: &mut [f64],
    ) -> SolverResult<()> {
        let n = self.junction_count();
        check_len("diagonal", n, diag.len())?;
        check_len("right-hand side", n, rhs.len())?;
        check_len("off-diagonal", self.coeff_count(), off_diag.len())?;

        self.temp.iter_mut().for_each(|t| *t = 0.0);
        self.pending.iter_mut().for_each(Vec::clear);

        for j in 0..n {
            // Columns k < j with a non-zero in row j, most recent first.
            let mut diagj = 0.0;
            let contributors = std::mem::take(&mut self.pending[j]);
            for &k in contributors.iter().rev() {
                let kfirst = self.first[k];
                let ljk = off_diag[self.lnz[kfirst]];
                diagj += ljk * ljk;
                let istrt = kfirst + 1;
                let istop = self.xlnz[k + 1];
                if istrt < istop {
                    self.first[k] = istrt;
                    self.pending[self.nzsub[istrt]].push(k);
                    for i in istrt..istop {
                        self.temp[self.nzsub[i]] += off_diag[self.lnz[i]] * ljk;
                    }
                }
            }
            let mut reuse = contributors;
            reuse.clear();
            self.pending[j] = reuse;

            let d = diag[j] - diagj;
            if d <= 0.0 || d.is_nan() {
                return Err(SolverError::IllConditioned { equation: j + 1 });
            }
            let d = d.sqrt();
            diag[j] = d;

            let istrt = self.xlnz[j];
            let istop = self.xlnz[j + 1];
            if istrt < istop {
                self.first[j] = istrt;
                self.pending[self.nzsub[istrt]].push(j);
                for i in istrt..istop {
                    let isub = self.nzsub[i];
                    let slot = self.lnz[i];
                    off_diag[slot] = (off_diag[slot] - self.temp[isub]) / d;
                    self.temp[isub] = 0.0;
                }
            }
        }

        // L y = b
        for j in 0..n {
            let bj = rhs[j] / diag[j];
            rhs[j] = bj;
            for i in self.xlnz[j]..self.xlnz[j + 1] {
                rhs[self.nzsub[i]] -= off_diag[self.lnz[i]] * bj;
            }
        }

        // Lᵀ x = y
        for j in (0..n).rev() {
            let mut bj = rhs[j];
            for i in self.xlnz[j]..self.xlnz[j + 1] {
                bj -= off_diag[self.lnz[i]] * rhs[self.nzsub[i]];
            }
            rhs[j] = bj / diag[j];
        }
        Ok(())
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> SolverResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(SolverError::Dimension { what, expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Conductance assembly for links with positive weights `g`.
    fn assemble(
        m: &SparseMatrix,
        junctions: usize,
        links: &[(usize, usize)],
        g: &[f64],
    ) -> (Vec<f64>, Vec<f64>) {
        let mut diag = vec![0.0; junctions];
        let mut off = vec![0.0; m.coeff_count()];
        for (k, &(a, b)) in links.iter().enumerate() {
            off[m.coeff_index(k)] -= g[k];
            if a < junctions {
                diag[m.row(a)] += g[k];
            }
            if b < junctions {
                diag[m.row(b)] += g[k];
            }
        }
        (diag, off)
    }

    #[test]
    fn solves_small_loop_against_dense() {
        let links = [(4, 0), (0, 1), (1, 2), (2, 3), (3, 0), (1, 3)];
        let g = [2.0, 1.0, 0.5, 3.0, 1.5, 0.25];
        let mut m = SparseMatrix::build(5, 4, &links).unwrap();
        let (mut diag, mut off) = assemble(&m, 4, &links, &g);
        let a = m.to_dense(&diag, &off);
        let b = [1.0, -2.0, 0.5, 4.0];
        let mut rhs = b.to_vec();
        m.factor_and_solve(&mut diag, &mut off, &mut rhs).unwrap();
        let x = nalgebra::DVector::from_column_slice(&rhs);
        let r = &a * x - nalgebra::DVector::from_column_slice(&b);
        assert!(r.amax() < 1e-10, "residual {}", r.amax());
    }

    #[test]
    fn zero_pivot_reports_row() {
        // junction 1 only touches junction 0 through a zero-weight link
        let links = [(2, 0), (0, 1)];
        let mut m = SparseMatrix::build(3, 2, &links).unwrap();
        let (mut diag, mut off) = assemble(&m, 2, &links, &[1.0, 0.0]);
        let mut rhs = vec![0.0; 2];
        let err = m.factor_and_solve(&mut diag, &mut off, &mut rhs).unwrap_err();
        let row = m.row(1) + 1;
        assert!(matches!(err, SolverError::IllConditioned { equation } if equation == row));
    }

    #[test]
    fn dimension_mismatch() {
        let mut m = SparseMatrix::build(2, 1, &[(1, 0)]).unwrap();
        let err = m
            .factor_and_solve(&mut [1.0, 1.0], &mut [0.0], &mut [0.0])
            .unwrap_err();
        assert!(matches!(err, SolverError::Dimension { .. }));
    }
}
