//! Generic SAT solver interface that supports incremental solving

use derivative::Derivative;

use crate::{datastructure::VarVec, literal::Lit};

#[cfg(feature = "cryptominisat")]
pub(crate) mod cmsat;
pub(crate) mod varisat;

/// Incremental SAT solver interface.
///
/// We assume variables to be index-based, such that mapping from
/// [`crate::literal::Lit`] to [`SatSolver::Lit`] is cheap.
pub(crate) trait SatSolver: Default {
    type Lit: SatSolverLit;
    type Err: std::error::Error + 'static;

    fn add_variable(&mut self) -> Self::Lit;
    fn add_clause(&mut self, lits: &[Self::Lit]);
    fn solve_with_assumptions(&mut self, assumptions: &[Self::Lit]) -> Result<bool, Self::Err>;
    fn model(&mut self) -> Option<&[Self::Lit]>;
    fn failed_assumptions(&mut self) -> Option<&[Self::Lit]>;

    fn solve(&mut self) -> Result<bool, Self::Err> {
        self.solve_with_assumptions(&[])
    }
}

pub(crate) trait SatSolverLit: Copy + Eq + std::ops::Not<Output = Self> {}

/// Incremental solver with a variable lookup table and a stack of scopes.
///
/// Each pushed scope owns an activation literal that is appended, negated,
/// to every clause added inside the scope; the activation literals of all
/// open scopes are assumed on every solve. Popping a scope retires its
/// clauses by asserting the negated activation literal as a unit clause.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct ScopedSolver<S: SatSolver> {
    #[derivative(Debug = "ignore")]
    sat_solver: S,
    #[derivative(Debug = "ignore")]
    var_lookup: VarVec<Option<S::Lit>>,
    #[derivative(Debug = "ignore")]
    scopes: Vec<S::Lit>,
    #[derivative(Debug = "ignore")]
    assumptions: Vec<S::Lit>,
    #[derivative(Debug = "ignore")]
    clause_buf: Vec<S::Lit>,
}

impl<S: SatSolver> Default for ScopedSolver<S> {
    fn default() -> Self {
        Self {
            sat_solver: S::default(),
            var_lookup: VarVec::default(),
            scopes: Vec::default(),
            assumptions: Vec::default(),
            clause_buf: Vec::default(),
        }
    }
}

impl<S: SatSolver> ScopedSolver<S> {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.var_lookup.set_var_count(count);
    }

    /// The solver literal corresponding to `lit`, allocating a solver
    /// variable on first use.
    pub(crate) fn lookup(&mut self, lit: Lit) -> S::Lit {
        let sat_var =
            *self.var_lookup[lit.var()].get_or_insert_with(|| self.sat_solver.add_variable());
        if lit.is_negative() {
            !sat_var
        } else {
            sat_var
        }
    }

    /// A fresh solver variable without a QCNF variable counterpart (arbiter and
    /// activation literals).
    pub(crate) fn fresh_var(&mut self) -> S::Lit {
        self.sat_solver.add_variable()
    }

    pub(crate) fn push(&mut self) {
        let act = self.sat_solver.add_variable();
        self.scopes.push(act);
    }

    /// Pops scopes until `depth` scopes remain; the clauses of the popped
    /// scopes are permanently disabled. Popping below depth 0 is a usage
    /// violation and ignored.
    pub(crate) fn pop_to(&mut self, depth: usize) {
        debug_assert!(depth <= self.scopes.len());
        while self.scopes.len() > depth {
            let act = self.scopes.pop().expect("scope stack is non-empty");
            self.sat_solver.add_clause(&[!act]);
        }
    }

    /// Adds a clause over solver literals inside the current scope.
    pub(crate) fn add_scoped_clause(&mut self, lits: &[S::Lit]) {
        self.clause_buf.clear();
        self.clause_buf.extend_from_slice(lits);
        if let Some(&act) = self.scopes.last() {
            self.clause_buf.push(!act);
        }
        let buf = std::mem::take(&mut self.clause_buf);
        self.sat_solver.add_clause(&buf);
        self.clause_buf = buf;
    }

    /// Adds a clause over [`Lit`]s inside the current scope.
    pub(crate) fn add_scoped_clause_lits(&mut self, lits: &[Lit]) {
        let mapped: Vec<S::Lit> = lits.iter().map(|&l| self.lookup(l)).collect();
        self.add_scoped_clause(&mapped);
    }

    /// Adds a clause that survives all pops.
    pub(crate) fn add_permanent_clause(&mut self, lits: &[S::Lit]) {
        self.sat_solver.add_clause(lits);
    }

    pub(crate) fn add_permanent_clause_lits(&mut self, lits: &[Lit]) {
        let mapped: Vec<S::Lit> = lits.iter().map(|&l| self.lookup(l)).collect();
        self.add_permanent_clause(&mapped);
    }

    /// Records a persistent assumption used for every subsequent solve.
    pub(crate) fn assume(&mut self, lit: Lit) {
        let mapped = self.lookup(lit);
        self.assumptions.push(mapped);
    }

    pub(crate) fn solve(&mut self) -> Result<bool, S::Err> {
        self.solve_with(&[])
    }

    pub(crate) fn solve_with(&mut self, extra: &[S::Lit]) -> Result<bool, S::Err> {
        let assumptions: Vec<S::Lit> = self
            .scopes
            .iter()
            .chain(self.assumptions.iter())
            .chain(extra.iter())
            .copied()
            .collect();
        self.sat_solver.solve_with_assumptions(&assumptions)
    }

    /// The value of `lit` in the current model.
    #[allow(dead_code)]
    pub(crate) fn value(&mut self, lit: Lit) -> Option<bool> {
        let mapped = self.var_lookup[lit.var()]?;
        let model = self.sat_solver.model()?;
        if model.contains(&mapped) {
            Some(lit.is_positive())
        } else if model.contains(&!mapped) {
            Some(lit.is_negative())
        } else {
            None
        }
    }

    /// The current model restricted to looked-up QCNF variables.
    pub(crate) fn orig_model(&mut self) -> Option<Vec<Lit>> {
        let model = self.sat_solver.model()?;
        Some(
            self.var_lookup
                .iter()
                .filter_map(|(var, &mapped)| {
                    let mapped = mapped?;
                    if model.contains(&mapped) {
                        Some(var.positive())
                    } else if model.contains(&!mapped) {
                        Some(var.negative())
                    } else {
                        None
                    }
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    pub(crate) fn test_basic<S: SatSolver>() -> Result<(), Box<dyn std::error::Error>> {
        let mut solver = S::default();

        // create variables
        let x = solver.add_variable();
        let y = solver.add_variable();
        let z = solver.add_variable();

        solver.add_clause(&[!x, y]);
        solver.add_clause(&[!y, z]);
        assert!(solver.solve()?);

        solver.add_clause(&[!z, x]);
        assert!(solver.solve()?);

        let model = solver.model().unwrap();
        assert!(
            [x, y, z].into_iter().all(|lit| model.contains(&lit))
                || [!x, !y, !z].into_iter().all(|lit| model.contains(&lit))
        );

        // solve with assumptions
        let ignore_clauses = solver.add_variable();
        solver.add_clause(&[ignore_clauses, !z, !y]);
        solver.add_clause(&[ignore_clauses, z, y]);

        assert!(!solver.solve_with_assumptions(&[!ignore_clauses])?);

        solver.add_clause(&[ignore_clauses]);
        assert!(solver.solve()?);

        Ok(())
    }

    #[test]
    fn scoped_push_pop() -> Result<(), Box<dyn std::error::Error>> {
        let mut solver: ScopedSolver<crate::sat::varisat::Varisat<'static>> =
            ScopedSolver::default();
        solver.set_var_count(2);
        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(2);

        solver.add_scoped_clause_lits(&[a, b]);
        assert!(solver.solve()?);

        solver.push();
        solver.add_scoped_clause_lits(&[!a]);
        solver.add_scoped_clause_lits(&[!b]);
        assert!(!solver.solve()?);

        solver.pop_to(0);
        assert!(solver.solve()?);
        Ok(())
    }

    #[test]
    fn persistent_assumptions() -> Result<(), Box<dyn std::error::Error>> {
        let mut solver: ScopedSolver<crate::sat::varisat::Varisat<'static>> =
            ScopedSolver::default();
        solver.set_var_count(2);
        let a = Lit::from_dimacs(1);
        let b = Lit::from_dimacs(2);

        solver.add_scoped_clause_lits(&[a, b]);
        solver.assume(!a);
        assert!(solver.solve()?);
        assert_eq!(solver.value(b), Some(true));

        solver.assume(!b);
        assert!(!solver.solve()?);
        Ok(())
    }
}
