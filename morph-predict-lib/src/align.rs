// Generalized Markov edit distance.
//
// Two things make this more than textbook edit distance:
//   a) a switching cost charged whenever the operation sequence transitions
//      into or out of Equal (never charged at the start), which makes the
//      cost second-order and forces the DP state to carry the last operation;
//   b) per-source-position cost arrays for Equal and Subst, so callers can
//      bias alignment toward preserving particular positions.

use crate::error::ModelError;
use crate::types::{Alignment, Form, Operation};

/// Cost configuration for one alignment. The per-position vectors are indexed
/// by source position and must have length `src.len()`.
#[derive(Debug, Clone)]
pub struct EditCosts {
    pub equal: Vec<f64>,
    pub subst: Vec<f64>,
    pub insert: f64,
    pub delete: f64,
    pub switch: f64,
}

impl EditCosts {
    /// Ordinary edit distance: Equal free, everything else costs 1.
    pub fn standard(src_len: usize, switch: f64) -> EditCosts {
        EditCosts {
            equal: vec![0.0; src_len],
            subst: vec![1.0; src_len],
            insert: 1.0,
            delete: 1.0,
            switch,
        }
    }

    /// Maximal character alignment: Equal is rewarded, nothing else is
    /// charged, so the cheapest path aligns as many symbols as possible
    /// regardless of distance.
    pub fn max_alignment(src_len: usize, switch: f64) -> EditCosts {
        EditCosts {
            equal: vec![-1.0; src_len],
            subst: vec![0.0; src_len],
            insert: 0.0,
            delete: 0.0,
            switch,
        }
    }

    /// Max-alignment with a caller-supplied per-position Equal cost vector;
    /// used by the consistent-alignment re-estimation loop.
    pub fn weighted_max_alignment(equal: Vec<f64>, switch: f64) -> EditCosts {
        EditCosts {
            subst: vec![0.0; equal.len()],
            equal,
            insert: 0.0,
            delete: 0.0,
            switch,
        }
    }
}

#[derive(Clone, Copy)]
struct Cell {
    cost: f64,
    // Predecessor chart coordinates (src index, trg index, last-op index);
    // None only for the four seed cells at (0, 0).
    prev: Option<(usize, usize, usize)>,
}

struct Chart {
    cells: Vec<Option<Cell>>,
    trg_len: usize,
}

impl Chart {
    fn new(src_len: usize, trg_len: usize) -> Chart {
        Chart {
            cells: vec![None; (src_len + 1) * (trg_len + 1) * Operation::ALL.len()],
            trg_len,
        }
    }

    fn idx(&self, src: usize, trg: usize, op: usize) -> usize {
        (src * (self.trg_len + 1) + trg) * Operation::ALL.len() + op
    }

    fn get(&self, src: usize, trg: usize, op: usize) -> Option<Cell> {
        self.cells[self.idx(src, trg, op)]
    }

    fn relax(&mut self, src: usize, trg: usize, op: usize, cell: Cell) {
        let i = self.idx(src, trg, op);
        match self.cells[i] {
            Some(existing) if existing.cost <= cell.cost => {}
            _ => self.cells[i] = Some(cell),
        }
    }
}

fn is_legal(op: Operation, src: &Form, trg: &Form, src_index: usize, trg_index: usize) -> bool {
    let room_src = src_index < src.len();
    let room_trg = trg_index < trg.len();
    match op {
        Operation::Insert => room_trg,
        Operation::Delete => room_src,
        Operation::Equal | Operation::Subst => {
            if !room_src || !room_trg {
                return false;
            }
            let same = src.symbol(src_index) == trg.symbol(trg_index);
            (op == Operation::Equal) == same
        }
    }
}

/// Computes the minimum-cost operation sequence transforming `src` into
/// `trg` under the given cost configuration.
///
/// The chart is indexed by (src index, trg index, last operation); all four
/// last-op variants are seeded at (0, 0) with cost 0 so the initial switch is
/// free. Ties keep the earliest-relaxed entry, which makes the result
/// deterministic in `Operation::ALL` order.
pub fn align(src: &Form, trg: &Form, costs: &EditCosts) -> Result<Alignment, ModelError> {
    for per_position in [&costs.equal, &costs.subst] {
        if per_position.len() != src.len() {
            return Err(ModelError::CostLengthMismatch {
                got: per_position.len(),
                expected: src.len(),
            });
        }
    }
    let mut chart = Chart::new(src.len(), trg.len());
    for op in 0..Operation::ALL.len() {
        chart.relax(0, 0, op, Cell { cost: 0.0, prev: None });
    }
    for src_index in 0..=src.len() {
        for trg_index in 0..=trg.len() {
            for last in 0..Operation::ALL.len() {
                let Some(cell) = chart.get(src_index, trg_index, last) else {
                    continue;
                };
                let last_op = Operation::ALL[last];
                for op in Operation::ALL {
                    if !is_legal(op, src, trg, src_index, trg_index) {
                        continue;
                    }
                    let mut cost = cell.cost
                        + match op {
                            Operation::Equal => costs.equal[src_index],
                            Operation::Subst => costs.subst[src_index],
                            Operation::Insert => costs.insert,
                            Operation::Delete => costs.delete,
                        };
                    // Seed cells carry no real last operation, so the first
                    // step never pays (or collects) the switching cost.
                    if cell.prev.is_some()
                        && (last_op == Operation::Equal) != (op == Operation::Equal)
                    {
                        cost += costs.switch;
                    }
                    let next_src = src_index + usize::from(op.advances_source());
                    let next_trg = trg_index + usize::from(op.advances_target());
                    chart.relax(
                        next_src,
                        next_trg,
                        op.index(),
                        Cell {
                            cost,
                            prev: Some((src_index, trg_index, last)),
                        },
                    );
                }
            }
        }
    }
    // Best final cell over the four last-op variants.
    let mut best: Option<(usize, Cell)> = None;
    for op in 0..Operation::ALL.len() {
        if let Some(cell) = chart.get(src.len(), trg.len(), op) {
            if best.map_or(true, |(_, b)| cell.cost < b.cost) {
                best = Some((op, cell));
            }
        }
    }
    let (mut op_index, mut cell) = best.ok_or_else(|| ModelError::NoAlignmentPath {
        src: src.to_string(),
        trg: trg.to_string(),
    })?;
    let cost = cell.cost;
    let mut ops = Vec::new();
    while let Some((prev_src, prev_trg, prev_op)) = cell.prev {
        ops.push(Operation::ALL[op_index]);
        cell = chart
            .get(prev_src, prev_trg, prev_op)
            .ok_or_else(|| ModelError::NoAlignmentPath {
                src: src.to_string(),
                trg: trg.to_string(),
            })?;
        op_index = prev_op;
    }
    ops.reverse();
    Ok(Alignment {
        src: src.clone(),
        trg: trg.clone(),
        ops,
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ops_to_string;

    fn standard(src: &str, trg: &str, switch: f64) -> Alignment {
        let src = Form::from(src);
        let trg = Form::from(trg);
        let costs = EditCosts::standard(src.len(), switch);
        align(&src, &trg, &costs).unwrap()
    }

    fn max_align(src: &str, trg: &str) -> Alignment {
        let src = Form::from(src);
        let trg = Form::from(trg);
        let costs = EditCosts::max_alignment(src.len(), 0.0);
        align(&src, &trg, &costs).unwrap()
    }

    #[test]
    fn identical_forms_align_for_free() {
        let aligned = standard("aaaaaa", "aaaaaa", 0.0);
        assert_eq!(ops_to_string(&aligned.ops), "======");
        assert_eq!(aligned.cost, 0.0);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn scattered_insertions() {
        let aligned = standard("aaaaaa", "baaacaaad", 0.0);
        assert_eq!(ops_to_string(&aligned.ops), "I===I===I");
        assert_eq!(aligned.cost, 3.0);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn subst_and_deletions() {
        let aligned = standard("staffed", "stuff", 0.0);
        assert_eq!(ops_to_string(&aligned.ops), "==S==DD");
        assert_eq!(aligned.cost, 3.0);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn positive_switch_cost_prefers_substitutions() {
        // With a positive switching cost it is cheaper to stay out of Equal
        // and substitute through the mismatched region.
        let aligned = standard("heissen", "hiesst", 0.1);
        assert_eq!(&ops_to_string(&aligned.ops)[..4], "=SS=");
        assert!((aligned.cost - 4.3).abs() < 1e-9);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn negative_switch_cost_rewards_switching() {
        let aligned = standard("heissen", "hiesst", -0.1);
        let rendered = ops_to_string(&aligned.ops);
        assert_eq!(&rendered[..1], "=");
        assert!(rendered[1..2] == *"I" || rendered[1..2] == *"D");
        assert_eq!(&rendered[2..3], "=");
        assert!((aligned.cost - 3.5).abs() < 1e-9);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn max_alignment_prefers_long_matches() {
        // Standard alignment would just substitute six times; max-alignment
        // deletes and inserts so the "gg" symbols line up.
        let aligned = max_align("aaaagg", "ggbbbb");
        assert_eq!(ops_to_string(&aligned.ops), "DDDD==IIII");
        assert_eq!(aligned.cost, -2.0);
        assert!(aligned.is_consistent());
    }

    #[test]
    fn first_operation_pays_no_switch() {
        // A lone substitution must cost exactly the subst entry; a negative
        // switching cost must not discount it through a mismatched seed.
        let aligned = standard("a", "b", -1.0);
        assert_eq!(ops_to_string(&aligned.ops), "S");
        assert_eq!(aligned.cost, 1.0);
    }

    #[test]
    fn cost_vector_length_is_checked() {
        let src = Form::from("abc");
        let trg = Form::from("abd");
        let costs = EditCosts::weighted_max_alignment(vec![0.0; 2], 0.0);
        assert!(align(&src, &trg, &costs).is_err());
    }

    #[test]
    fn subst_vector_length_is_checked() {
        let src = Form::from("abc");
        let trg = Form::from("abd");
        let mut costs = EditCosts::standard(src.len(), 0.0);
        costs.subst.pop();
        assert!(matches!(
            align(&src, &trg, &costs),
            Err(ModelError::CostLengthMismatch { got: 2, expected: 3 })
        ));
    }
}
