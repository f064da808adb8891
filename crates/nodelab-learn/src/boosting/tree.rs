//! Leaf-wise regression tree grown on gradient histograms.

use super::bins::BinnedMatrix;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Tree node. Children are indices into [`Tree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        /// `x[feature] <= threshold` goes left.
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// One boosted tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Output for a dense row. Features past the row's end read as 0.
    pub fn predict_row(&self, row: ArrayView1<'_, f32>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row.get(feature).copied().unwrap_or(0.0);
                    idx = if v <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Growth constraints for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowParams {
    pub num_leaves: usize,
    pub min_data_in_leaf: usize,
    pub min_sum_hessian_in_leaf: f64,
    pub lambda_l2: f64,
    pub shrinkage: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Leaf {
    node: usize,
    rows: Vec<usize>,
    grad: f64,
    hess: f64,
    best: Option<Candidate>,
}

fn leaf_objective(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn best_split(
    data: &BinnedMatrix,
    rows: &[usize],
    grad: &[f64],
    hess: &[f64],
    g_total: f64,
    h_total: f64,
    p: &GrowParams,
) -> Option<Candidate> {
    if rows.len() < 2 * p.min_data_in_leaf {
        return None;
    }
    let parent = leaf_objective(g_total, h_total, p.lambda_l2);
    let mut best: Option<Candidate> = None;

    for (feature, column) in data.columns.iter().enumerate() {
        let n_bins = data.features[feature].n_bins();
        if n_bins < 2 {
            continue;
        }
        let mut hist = vec![(0.0f64, 0.0f64, 0usize); n_bins];
        for &r in rows {
            let slot = &mut hist[column[r] as usize];
            slot.0 += grad[r];
            slot.1 += hess[r];
            slot.2 += 1;
        }

        let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
        for (bin, &(g, h, n)) in hist.iter().enumerate().take(n_bins - 1) {
            gl += g;
            hl += h;
            nl += n;
            let nr = rows.len() - nl;
            if nl < p.min_data_in_leaf || nr < p.min_data_in_leaf {
                continue;
            }
            let (gr, hr) = (g_total - gl, h_total - hl);
            if hl < p.min_sum_hessian_in_leaf || hr < p.min_sum_hessian_in_leaf {
                continue;
            }
            let gain = leaf_objective(gl, hl, p.lambda_l2) + leaf_objective(gr, hr, p.lambda_l2)
                - parent;
            if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                best = Some(Candidate { feature, bin, gain });
            }
        }
    }
    best
}

/// Grow one tree leaf-wise: always split the leaf with the largest gain,
/// until `num_leaves` is reached or no split has positive gain.
pub(crate) fn grow_tree(data: &BinnedMatrix, grad: &[f64], hess: &[f64], p: &GrowParams) -> Tree {
    let n_rows = grad.len();
    let rows: Vec<usize> = (0..n_rows).collect();
    let (g, h) = (grad.iter().sum::<f64>(), hess.iter().sum::<f64>());

    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut leaves = vec![Leaf {
        node: 0,
        best: best_split(data, &rows, grad, hess, g, h, p),
        rows,
        grad: g,
        hess: h,
    }];

    while leaves.len() < p.num_leaves {
        let pick = leaves
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.best.map(|c| (i, c.gain)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((i, _)) = pick else { break };

        let leaf = leaves.swap_remove(i);
        let Some(split) = leaf.best else { break };
        let column = &data.columns[split.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
            .rows
            .iter()
            .partition(|&&r| (column[r] as usize) <= split.bin);

        let left_node = nodes.len();
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[leaf.node] = Node::Split {
            feature: split.feature,
            threshold: data.features[split.feature].threshold(split.bin),
            left: left_node,
            right: left_node + 1,
        };

        for (node, child_rows) in [(left_node, left_rows), (left_node + 1, right_rows)] {
            let cg: f64 = child_rows.iter().map(|&r| grad[r]).sum();
            let ch: f64 = child_rows.iter().map(|&r| hess[r]).sum();
            leaves.push(Leaf {
                node,
                best: best_split(data, &child_rows, grad, hess, cg, ch, p),
                rows: child_rows,
                grad: cg,
                hess: ch,
            });
        }
    }

    for leaf in &leaves {
        let value = -leaf.grad / (leaf.hess + p.lambda_l2) * p.shrinkage;
        nodes[leaf.node] = Node::Leaf { value };
    }
    Tree { nodes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(num_leaves: usize) -> GrowParams {
        GrowParams {
            num_leaves,
            min_data_in_leaf: 1,
            min_sum_hessian_in_leaf: 1e-3,
            lambda_l2: 0.0,
            shrinkage: 1.0,
        }
    }

    #[test]
    fn test_single_split_separates_gradients() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0]];
        let data = BinnedMatrix::build(x.view(), 255);
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];

        let tree = grow_tree(&data, &grad, &hess, &params(2));
        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.predict_row(x.row(0)), -1.0);
        assert_eq!(tree.predict_row(x.row(3)), 1.0);
    }

    #[test]
    fn test_constant_feature_stays_a_leaf() {
        let x = array![[1.0f32], [1.0], [1.0]];
        let data = BinnedMatrix::build(x.view(), 255);
        let tree = grow_tree(&data, &[1.0, -1.0, 0.5], &[1.0; 3], &params(31));
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn test_leaf_budget() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let data = BinnedMatrix::build(x.view(), 255);
        let grad = [3.0, -2.0, 1.0, -4.0, 2.0, -1.0];
        let tree = grow_tree(&data, &grad, &[1.0; 6], &params(3));
        assert_eq!(tree.num_leaves(), 3);
    }

    #[test]
    fn test_min_data_in_leaf() {
        let x = array![[0.0f32], [1.0], [2.0], [3.0]];
        let data = BinnedMatrix::build(x.view(), 255);
        let mut p = params(31);
        p.min_data_in_leaf = 3;
        let tree = grow_tree(&data, &[1.0, 1.0, -1.0, -1.0], &[1.0; 4], &p);
        assert_eq!(tree.num_leaves(), 1);
    }
}
