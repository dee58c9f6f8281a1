//! Counterexample-guided abstraction refinement over universal
//! assignments.
//!
//! A side solver over the universal variables accumulates blocking cubes.
//! Each round instantiates the matrix under a universal assignment and
//! solves over the existentials: a response means the assignment is
//! handled and its (minimized) cube is blocked in the side solver and the
//! Skolem adapter; no response means the assignment refutes the formula.

use super::{skolem::Skolem, stats::RefinementStats};
use crate::{
    clause::db::ClauseId,
    literal::{Lit, Lits},
    qcnf::QCNF,
    sat::{varisat::Varisat, ScopedSolver},
};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const CUBE_SIZE_HORIZON: f64 = 0.9;

/// Outcome of one CEGAR round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CegarRound {
    /// the universal assignment has an existential response; its cube was
    /// blocked in both solvers
    Blocked,
    /// the universal assignment refutes the formula
    Refuted(Vec<Lit>),
}

#[derive(Debug, Default)]
pub(crate) struct Cegar {
    /// side solver over universals, accumulating blocking cubes
    universal_solver: ScopedSolver<Varisat<'static>>,
    /// holds the full matrix; assumed universal cubes instantiate it
    matrix_solver: ScopedSolver<Varisat<'static>>,
    pub(crate) stats: RefinementStats,
}

impl Cegar {
    pub(crate) fn init(&mut self, qcnf: &QCNF) {
        self.universal_solver.set_var_count(qcnf.get_var_count());
        self.matrix_solver.set_var_count(qcnf.get_var_count());
        // register every universal so side-solver models assign them all
        for var in qcnf.universal_vars() {
            let _ = self.universal_solver.lookup(var.positive());
        }
        for (_, clause) in qcnf.clauses().iter() {
            self.matrix_solver.add_permanent_clause_lits(clause.lits());
        }
    }

    pub(crate) fn new_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        self.matrix_solver.add_permanent_clause_lits(qcnf.clause(clause_id).lits());
    }

    /// Mirrors a universal constraint into the side solver.
    pub(crate) fn add_universal_constraint(&mut self, lit: Lit) {
        self.universal_solver.add_permanent_clause_lits(&[lit]);
        self.universal_solver.assume(lit);
    }

    pub(crate) fn recent_average_cube_size(&self) -> f64 {
        self.stats.recent_average_cube_size
    }

    /// A universal assignment not yet blocked, or `None` when the side
    /// solver is exhausted (every universal assignment is handled).
    pub(crate) fn next_universal_assignment(&mut self, qcnf: &QCNF) -> Option<Vec<Lit>> {
        match self.universal_solver.solve() {
            Ok(true) => {
                let model = self.universal_solver.orig_model().unwrap_or_default();
                Some(
                    model
                        .into_iter()
                        .filter(|l| qcnf.is_universal(l.var()))
                        .collect(),
                )
            }
            Ok(false) => None,
            Err(err) => {
                warn!("side solver failed: {err}");
                None
            }
        }
    }

    /// One CEGAR round for the given universal assignment. The assignment
    /// is completed to all universal variables first; instantiating the
    /// matrix under a partial assignment would leave the remaining
    /// universals to the existential player.
    pub(crate) fn round(
        &mut self,
        qcnf: &QCNF,
        skolem: &mut Skolem,
        universal_assignment: &[Lit],
    ) -> CegarRound {
        self.stats.rounds += 1;
        let mut universal_assignment = universal_assignment.to_vec();
        for var in qcnf.universal_vars() {
            if !universal_assignment.iter().any(|l| l.var() == var) {
                universal_assignment.push(var.positive());
            }
        }
        let universal_assignment = &universal_assignment[..];
        trace!("cegar round for {}", Lits(universal_assignment));
        let assumptions: Vec<_> =
            universal_assignment.iter().map(|&l| self.matrix_solver.lookup(l)).collect();
        match self.matrix_solver.solve_with(&assumptions) {
            Ok(true) => {
                let response: HashSet<Lit> =
                    self.matrix_solver.orig_model().unwrap_or_default().into_iter().collect();
                let cube = self.minimize_cube(qcnf, universal_assignment, &response);
                self.stats.blocked_cubes += 1;
                self.stats.recent_average_cube_size = self.stats.recent_average_cube_size
                    * CUBE_SIZE_HORIZON
                    + cube.len() as f64 * (1.0 - CUBE_SIZE_HORIZON);
                let blocking: Vec<Lit> = cube.iter().map(|&l| !l).collect();
                self.universal_solver.add_permanent_clause_lits(&blocking);
                skolem.block_cube(&cube);
                CegarRound::Blocked
            }
            Ok(false) => {
                debug!("universal assignment refutes the formula");
                CegarRound::Refuted(universal_assignment.to_vec())
            }
            Err(err) => {
                warn!("matrix solver failed: {err}");
                CegarRound::Refuted(universal_assignment.to_vec())
            }
        }
    }

    /// Shrinks the cube to the universal literals the response actually
    /// relies on: one satisfying universal literal per clause the
    /// existential part of the response leaves unsatisfied.
    fn minimize_cube(
        &self,
        qcnf: &QCNF,
        universal_assignment: &[Lit],
        response: &HashSet<Lit>,
    ) -> Vec<Lit> {
        let mut needed: Vec<Lit> = Vec::new();
        for (_, clause) in qcnf.clauses().iter() {
            let satisfied_existentially = clause
                .iter()
                .any(|&l| qcnf.is_existential(l.var()) && response.contains(&l));
            if satisfied_existentially {
                continue;
            }
            let Some(&witness) = clause
                .iter()
                .find(|&&l| qcnf.is_universal(l.var()) && universal_assignment.contains(&l))
            else {
                continue;
            };
            if !needed.contains(&witness) {
                needed.push(witness);
            }
        }
        debug!(
            "minimized cube from {} to {} literals",
            universal_assignment.len(),
            needed.len()
        );
        needed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exhausting_the_universal_space() {
        // e = !u is realizable; two rounds block both universal assignments
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            -1 -2;
        ];
        let mut skolem = Skolem::default();
        skolem.set_var_count(qcnf.get_var_count());
        let mut cegar = Cegar::default();
        cegar.init(&qcnf);

        let mut rounds = 0;
        while let Some(assignment) = cegar.next_universal_assignment(&qcnf) {
            rounds += 1;
            assert!(rounds <= 2, "two universal assignments exist");
            let outcome = cegar.round(&qcnf, &mut skolem, &assignment);
            assert_eq!(outcome, CegarRound::Blocked);
        }
        assert_eq!(rounds, 2);
    }

    #[test]
    fn refutation_is_detected() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            1 -2;
        ];
        let mut skolem = Skolem::default();
        skolem.set_var_count(qcnf.get_var_count());
        let mut cegar = Cegar::default();
        cegar.init(&qcnf);

        let refuting = vec![Lit::from_dimacs(-1)];
        let outcome = cegar.round(&qcnf, &mut skolem, &refuting);
        assert_eq!(outcome, CegarRound::Refuted(refuting));
    }
}
