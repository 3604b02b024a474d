use nalgebra::DVector;
use proptest::prelude::*;
use wn_solver::{SolverError, SparseMatrix};

#[derive(Debug)]
struct Case {
    junctions: usize,
    links: Vec<(usize, usize)>,
    weights: Vec<f64>,
}

/// Connected network: every junction hangs off an earlier node or the
/// reservoir (node `junctions`), plus optional cross links.
fn build_case(tree: &[(usize, f64)], extra: &[(usize, usize, f64)]) -> Case {
    let n = tree.len();
    let mut links = Vec::new();
    let mut weights = Vec::new();
    for (i, &(p, w)) in tree.iter().enumerate() {
        let parent = if i == 0 { n } else { p % (i + 1) };
        let parent = if parent == i { n } else { parent };
        links.push((parent, i));
        weights.push(w);
    }
    for &(a, b, w) in extra {
        let (a, b) = (a % (n + 1), b % (n + 1));
        if a != b {
            links.push((a, b));
            weights.push(w);
        }
    }
    Case {
        junctions: n,
        links,
        weights,
    }
}

fn assemble(m: &SparseMatrix, case: &Case) -> (Vec<f64>, Vec<f64>) {
    let n = case.junctions;
    let mut diag = vec![0.0; n];
    let mut off = vec![0.0; m.coeff_count()];
    for (k, &(a, b)) in case.links.iter().enumerate() {
        let g = case.weights[k];
        off[m.coeff_index(k)] -= g;
        if a < n {
            diag[m.row(a)] += g;
        }
        if b < n {
            diag[m.row(b)] += g;
        }
    }
    (diag, off)
}

fn network() -> impl Strategy<Value = Case> {
    (
        prop::collection::vec((0usize..1000, 0.1f64..10.0), 1..14),
        prop::collection::vec((0usize..1000, 0usize..1000, 0.1f64..10.0), 0..12),
    )
        .prop_map(|(tree, extra)| build_case(&tree, &extra))
}

proptest! {
    #[test]
    fn sparse_solution_matches_dense_cholesky(
        case in network(),
        b in prop::collection::vec(-100.0f64..100.0, 14),
    ) {
        let n = case.junctions;
        let mut m = SparseMatrix::build(n + 1, n, &case.links).unwrap();
        let (mut diag, mut off) = assemble(&m, &case);
        let a = m.to_dense(&diag, &off);
        let mut rhs = b[..n].to_vec();

        m.factor_and_solve(&mut diag, &mut off, &mut rhs).unwrap();

        let dense = a.clone().cholesky().expect("matrix is positive definite");
        let expected = dense.solve(&DVector::from_column_slice(&b[..n]));
        for i in 0..n {
            let tol = 1e-8 * (1.0 + expected[i].abs());
            prop_assert!((rhs[i] - expected[i]).abs() < tol, "row {}: {} vs {}", i, rhs[i], expected[i]);
        }
    }

    #[test]
    fn ordering_is_a_permutation(case in network()) {
        let n = case.junctions;
        let m = SparseMatrix::build(n + 1, n, &case.links).unwrap();
        let mut seen = vec![false; n];
        for r in 0..n {
            let node = m.node_at(r);
            prop_assert!(node < n);
            prop_assert_eq!(m.row(node), r);
            seen[node] = true;
        }
        prop_assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn build_is_deterministic(case in network()) {
        let n = case.junctions;
        let a = SparseMatrix::build(n + 1, n, &case.links).unwrap();
        let b = SparseMatrix::build(n + 1, n, &case.links).unwrap();
        prop_assert_eq!(a.order(), b.order());
        prop_assert_eq!(a.coeff_count(), b.coeff_count());
        for k in 0..case.links.len() {
            prop_assert_eq!(a.coeff_index(k), b.coeff_index(k));
        }
    }
}

#[test]
fn repeated_factorizations_reuse_scratch() {
    let links = [(3, 0), (0, 1), (1, 2), (2, 0)];
    let mut m = SparseMatrix::build(4, 3, &links).unwrap();
    for scale in [1.0, 2.0, 5.0] {
        let mut diag = vec![0.0; 3];
        let mut off = vec![0.0; m.coeff_count()];
        for (k, &(a, b)) in links.iter().enumerate() {
            off[m.coeff_index(k)] -= scale;
            for node in [a, b] {
                if node < 3 {
                    diag[m.row(node)] += scale;
                }
            }
        }
        // head equations with one unit of inflow at every junction
        let mut rhs = vec![scale; 3];
        m.factor_and_solve(&mut diag, &mut off, &mut rhs).unwrap();
        assert!(rhs.iter().all(|x| x.is_finite() && *x > 0.0));
    }
}

#[test]
fn singular_matrix_names_failing_equation() {
    // junction 1 is isolated
    let links = [(2, 0)];
    let mut m = SparseMatrix::build(3, 2, &links).unwrap();
    let mut diag = vec![0.0; 2];
    diag[m.row(0)] = 1.0;
    let mut off = vec![0.0; m.coeff_count()];
    let mut rhs = vec![1.0; 2];
    let err = m.factor_and_solve(&mut diag, &mut off, &mut rhs).unwrap_err();
    assert_eq!(
        err,
        SolverError::IllConditioned {
            equation: m.row(1) + 1
        }
    );
}
