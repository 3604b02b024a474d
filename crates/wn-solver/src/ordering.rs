//! Minimum-degree node ordering and symbolic factor storage.

use nalgebra::DMatrix;

use crate::error::{SolverError, SolverResult};

/// Symbolic structure of the junction equations.
///
/// Only junctions (`0..junction_count`) get matrix rows; storage nodes are
/// fixed-head and never enter the ordering. Each link owns a coefficient
/// slot equal to its own index unless it is parallel to an earlier link, in
/// which case it shares that link's slot. Fill-in slots follow the links.
///
/// The factor's column pattern is stored compactly: the entries of column `j`
/// are `xlnz[j]..xlnz[j + 1]`, with row indexes in `nzsub` (ascending) and
/// coefficient slots in `lnz`.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    node_count: usize,
    junction_count: usize,
    coeff_count: usize,
    ndx: Vec<usize>,
    row: Vec<usize>,
    order: Vec<usize>,
    pub(crate) xlnz: Vec<usize>,
    pub(crate) nzsub: Vec<usize>,
    pub(crate) lnz: Vec<usize>,
    pub(crate) temp: Vec<f64>,
    pub(crate) first: Vec<usize>,
    pub(crate) pending: Vec<Vec<usize>>,
}

/// Adjacency entry: (neighbour node, coefficient slot).
type AdjList = Vec<Vec<(usize, usize)>>;

impl SparseMatrix {
    /// Build the ordering and factor pattern for a network.
    ///
    /// `link_ends[k]` gives the start and end node of link `k`.
    pub fn build(
        node_count: usize,
        junction_count: usize,
        link_ends: &[(usize, usize)],
    ) -> SolverResult<Self> {
        if junction_count > node_count {
            return Err(SolverError::InvalidTopology {
                what: format!(
                    "{} junctions exceed {} nodes",
                    junction_count, node_count
                ),
            });
        }
        let link_count = link_ends.len();

        // Lists are appended to and scanned newest entry first.
        let mut adj: AdjList = vec![Vec::new(); node_count];
        let mut ndx = Vec::with_capacity(link_count);
        for (k, &(i, j)) in link_ends.iter().enumerate() {
            if i >= node_count || j >= node_count || i == j {
                return Err(SolverError::InvalidTopology {
                    what: format!("link {} has ends ({}, {})", k, i, j),
                });
            }
            if let Some(&(_, slot)) = adj[i].iter().rev().find(|(node, _)| *node == j) {
                ndx.push(slot);
                continue;
            }
            ndx.push(k);
            adj[i].push((j, k));
            adj[j].push((i, k));
        }

        // Storage nodes keep zero degree and are never eliminated here.
        let mut degree = vec![0usize; node_count];
        for (i, d) in degree.iter_mut().enumerate().take(junction_count) {
            *d = adj[i].len();
        }

        let n = junction_count;
        let mut order: Vec<usize> = (0..node_count).collect();
        let mut row: Vec<usize> = (0..node_count).collect();
        let mut coeff_count = link_count;
        for k in 0..n {
            let m = min_degree(&order, &degree, k, n);
            let knode = order[m];
            grow_list(knode, &mut adj, &mut degree, &mut coeff_count);
            order[m] = order[k];
            order[k] = knode;
            degree[knode] = 0;
        }
        for (k, &node) in order.iter().enumerate().take(n) {
            row[node] = k;
        }

        let (mut xlnz, mut nzsub, mut lnz) = store_sparse(n, &adj, &order, &row);
        order_sparse(n, &mut xlnz, &mut nzsub, &mut lnz);

        tracing::debug!(
            junctions = n,
            links = link_count,
            coeffs = coeff_count,
            nonzeros = nzsub.len(),
            "sparse structure built"
        );

        Ok(Self {
            node_count,
            junction_count,
            coeff_count,
            ndx,
            row,
            order,
            xlnz,
            nzsub,
            lnz,
            temp: vec![0.0; n],
            first: vec![0; n],
            pending: vec![Vec::new(); n],
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn junction_count(&self) -> usize {
        self.junction_count
    }

    /// Number of off-diagonal coefficient slots (links plus fill-ins).
    pub fn coeff_count(&self) -> usize {
        self.coeff_count
    }

    /// Number of stored off-diagonal entries of the factor.
    pub fn nonzero_count(&self) -> usize {
        self.nzsub.len()
    }

    /// Matrix row of a junction. Storage nodes map to themselves (outside the matrix).
    pub fn row(&self, node: usize) -> usize {
        self.row[node]
    }

    /// Node eliminated at matrix row `row`.
    pub fn node_at(&self, row: usize) -> usize {
        self.order[row]
    }

    /// Coefficient slot of a link.
    pub fn coeff_index(&self, link: usize) -> usize {
        self.ndx[link]
    }

    /// Elimination order (row to node) for the junction rows.
    pub fn order(&self) -> &[usize] {
        &self.order[..self.junction_count]
    }

    /// Dense symmetric matrix assembled from row-indexed diagonals and slot-indexed
    /// off-diagonals. Fill-in slots must be zero.
    pub fn to_dense(&self, diag: &[f64], off_diag: &[f64]) -> DMatrix<f64> {
        let n = self.junction_count;
        let mut a = DMatrix::zeros(n, n);
        for j in 0..n {
            a[(j, j)] = diag[j];
            for e in self.xlnz[j]..self.xlnz[j + 1] {
                let i = self.nzsub[e];
                let v = off_diag[self.lnz[e]];
                a[(i, j)] = v;
                a[(j, i)] = v;
            }
        }
        a
    }
}

/// Position in `order[k..n]` of the node with the smallest current degree
/// (first in scan order on ties).
fn min_degree(order: &[usize], degree: &[usize], k: usize, n: usize) -> usize {
    let mut min = n;
    let mut imin = n - 1;
    for (i, &node) in order.iter().enumerate().take(n).skip(k) {
        let m = degree[node];
        if m < min {
            min = m;
            imin = i;
        }
    }
    imin
}

/// Eliminate `knode`: connect every pair of its active neighbours.
fn grow_list(knode: usize, adj: &mut AdjList, degree: &mut [usize], coeff_count: &mut usize) {
    let list: Vec<(usize, usize)> = adj[knode].iter().rev().copied().collect();
    for (pos, &(node, _)) in list.iter().enumerate() {
        if degree[node] > 0 {
            degree[node] -= 1;
            new_links(node, &list[pos + 1..], adj, degree, coeff_count);
        }
    }
}

fn new_links(
    inode: usize,
    rest: &[(usize, usize)],
    adj: &mut AdjList,
    degree: &mut [usize],
    coeff_count: &mut usize,
) {
    for &(jnode, _) in rest {
        if degree[jnode] > 0 && !linked(adj, inode, jnode) {
            let slot = *coeff_count;
            *coeff_count += 1;
            adj[inode].push((jnode, slot));
            adj[jnode].push((inode, slot));
            degree[inode] += 1;
            degree[jnode] += 1;
        }
    }
}

fn linked(adj: &AdjList, i: usize, j: usize) -> bool {
    adj[i].iter().any(|&(node, _)| node == j)
}

/// Collect, column by column, the rows below the diagonal that hold non-zeros.
fn store_sparse(
    n: usize,
    adj: &AdjList,
    order: &[usize],
    row: &[usize],
) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut xlnz = Vec::with_capacity(n + 1);
    let mut nzsub = Vec::new();
    let mut lnz = Vec::new();
    xlnz.push(0);
    for i in 0..n {
        for &(node, slot) in adj[order[i]].iter().rev() {
            let j = row[node];
            if j > i && j < n {
                nzsub.push(j);
                lnz.push(slot);
            }
        }
        xlnz.push(nzsub.len());
    }
    (xlnz, nzsub, lnz)
}

/// Sort row indexes within each column by transposing the pattern twice.
fn order_sparse(n: usize, xlnz: &mut [usize], nzsub: &mut [usize], lnz: &mut [usize]) {
    let nnz = nzsub.len();
    let mut nzt = vec![0usize; n];
    for &r in nzsub.iter() {
        nzt[r] += 1;
    }
    let mut xlnzt = vec![0usize; n + 1];
    for i in 0..n {
        xlnzt[i + 1] = xlnzt[i] + nzt[i];
    }
    let mut nzsubt = vec![0usize; nnz];
    let mut lnzt = vec![0usize; nnz];
    transpose(n, xlnz, nzsub, lnz, &xlnzt, &mut nzsubt, &mut lnzt, &mut nzt);
    transpose(n, &xlnzt, &nzsubt, &lnzt, xlnz, nzsub, lnz, &mut nzt);
}

#[allow(clippy::too_many_arguments)]
fn transpose(
    n: usize,
    il: &[usize],
    jl: &[usize],
    xl: &[usize],
    ilt: &[usize],
    jlt: &mut [usize],
    xlt: &mut [usize],
    nzt: &mut [usize],
) {
    nzt.iter_mut().for_each(|c| *c = 0);
    for i in 0..n {
        for k in il[i]..il[i + 1] {
            let j = jl[k];
            let kk = ilt[j] + nzt[j];
            jlt[kk] = i;
            xlt[kk] = xl[k];
            nzt[j] += 1;
        }
    }
}
