//! The Skolem domain: tracks which existentials are determinized and keeps
//! their Skolem-function encoding in an incremental SAT solver.
//!
//! A clause whose only not-yet-deterministic existential literal is `l` is
//! an *implication clause* for `l`: whenever all its other literals are
//! false, `l` must be true. A variable with at least one implication clause
//! is a propagation candidate; it is determinized unless the solver finds an
//! assignment to the already-deterministic variables that fires implication
//! antecedents on both polarities, which is a first-order conflict.

use super::{
    conflict::ConflictDomain,
    stats::DeterminizationStats,
    DecLvl,
};
use crate::{
    clause::db::ClauseId,
    datastructure::{LitVec, VarVec},
    literal::{Lit, Lits, Var},
    qcnf::QCNF,
    sat::{varisat::Varisat, ScopedSolver},
};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkolemState {
    Ready,
    SkolemConflict,
    /// contradicting constants in the initial layer, proves unsatisfiability
    ConstantsConflict,
}

#[derive(Debug, Clone)]
pub(crate) struct SkolemConflict {
    pub(crate) var: Var,
    pub(crate) clause: ClauseId,
    /// model of the failed conflict check: the literals true in the
    /// conflicting assignment over deterministic variables
    pub(crate) assignment: HashSet<Lit>,
}

#[derive(Debug, Clone, Copy)]
struct Constant {
    value: bool,
    dec_lvl: DecLvl,
}

/// Implication clauses of one literal, keyed by the decision level that
/// produced them so that backtracking can retract them wholesale.
#[derive(Debug, Clone, Default)]
pub(crate) struct Implications {
    implications: BTreeMap<DecLvl, Vec<ClauseId>>,
}

impl Implications {
    fn add(&mut self, clause_id: ClauseId, lvl: DecLvl) {
        self.implications.entry(lvl).or_default().push(clause_id);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ClauseId> + '_ {
        self.implications.values().flat_map(IntoIterator::into_iter).copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.implications.is_empty()
    }

    /// Keeps all entries with level <= `lvl`, returning the removed clauses.
    fn backtrack_to(&mut self, lvl: DecLvl) -> Vec<ClauseId> {
        self.implications
            .split_off(&lvl.successor())
            .into_values()
            .flatten()
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Skolem {
    state: SkolemState,
    solver: ScopedSolver<Varisat<'static>>,
    /// determinized existentials; universals count as deterministic from the
    /// start and are not tracked here
    deterministic: VarVec<bool>,
    dec_lvls: VarVec<Option<DecLvl>>,
    constants: VarVec<Option<Constant>>,
    implications: LitVec<Implications>,
    /// decision level at which a clause was registered as implication clause
    registration: Vec<Option<DecLvl>>,
    /// propagation candidates, most recently registered on top so that a
    /// freshly learnt asserting clause is encoded before older conflicts
    /// are re-examined
    candidates: Vec<Var>,
    /// determinizations in chronological order, for backtracking
    trail: Vec<(DecLvl, Var)>,
    constants_trail: Vec<(DecLvl, Var)>,
    decision_lvl: DecLvl,
    push_count: usize,
    universals_assumptions: Vec<Lit>,
    conflict: Option<SkolemConflict>,
    pub(crate) stats: DeterminizationStats,
}

impl Default for SkolemState {
    fn default() -> Self {
        Self::Ready
    }
}

impl Skolem {
    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.deterministic.set_var_count(count);
        self.dec_lvls.set_var_count(count);
        self.constants.set_var_count(count);
        self.implications.set_var_count(count);
        self.solver.set_var_count(count);
    }

    fn ensure_clause_count(&mut self, count: usize) {
        if count > self.registration.len() {
            self.registration.resize(count, None);
        }
    }

    pub(crate) fn state(&self) -> SkolemState {
        self.state
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.state != SkolemState::Ready
    }

    pub(crate) fn conflict(&self) -> Option<&SkolemConflict> {
        self.conflict.as_ref()
    }

    pub(crate) fn decision_lvl(&self) -> DecLvl {
        self.decision_lvl
    }

    pub(crate) fn push_count(&self) -> usize {
        self.push_count
    }

    pub(crate) fn is_deterministic(&self, qcnf: &QCNF, var: Var) -> bool {
        qcnf.is_universal(var) || self.deterministic[var]
    }

    /// All existential variables carry a Skolem function.
    pub(crate) fn has_empty_domain(&self, qcnf: &QCNF) -> bool {
        qcnf.existential_vars().all(|var| self.deterministic[var])
    }

    pub(crate) fn get_decision_lvl(&self, var: Var) -> DecLvl {
        self.dec_lvls[var].unwrap_or(DecLvl::ROOT)
    }

    /// The level at which `var` became constant, if it did; may be lower
    /// than its determinization level.
    pub(crate) fn get_dlvl_for_constant(&self, var: Var) -> Option<DecLvl> {
        self.constants[var].map(|c| c.dec_lvl)
    }

    pub(crate) fn can_propagate(&self) -> bool {
        self.state == SkolemState::Ready && !self.candidates.is_empty()
    }

    pub(crate) fn universals_assumptions(&self) -> &[Lit] {
        &self.universals_assumptions
    }

    /// Whether unblocked universal assignments remain in the adapter. Used
    /// to distinguish a genuine refutation from an exhausted case.
    pub(crate) fn adapter_is_satisfiable(&mut self) -> bool {
        self.solver.solve().unwrap_or(false)
    }

    /// Restricts the universal player: asserts `lit` in the adapter and
    /// records it as an assumption.
    pub(crate) fn make_universal_assumption(&mut self, qcnf: &QCNF, lit: Lit) {
        if !qcnf.is_universal(lit.var()) {
            warn!("universal assumption on existential literal {lit}");
            debug_assert!(false, "universal assumption on existential literal");
            return;
        }
        debug!("universal assumption {lit}");
        self.solver.add_permanent_clause_lits(&[lit]);
        self.solver.assume(lit);
        self.universals_assumptions.push(lit);
        self.set_constant(lit, DecLvl::ROOT);
    }

    /// Permanently excludes a cube from the adapter's search space. Used by
    /// the CEGAR refinement (universal cubes) and by closed cases
    /// (interface cubes).
    pub(crate) fn block_cube(&mut self, cube: &[Lit]) {
        let blocking: Vec<Lit> = cube.iter().map(|&l| !l).collect();
        debug!("blocking cube {}", Lits(&blocking));
        self.solver.add_permanent_clause_lits(&blocking);
    }

    /// Restricts the adapter to the sub-space where `lit` holds for as long
    /// as the current decision level is active.
    pub(crate) fn assume_case_lit(&mut self, lit: Lit) {
        debug!("case assumption {lit} at lvl {}", self.decision_lvl);
        self.solver.add_scoped_clause_lits(&[lit]);
    }

    pub(crate) fn push(&mut self) {
        self.push_count += 1;
        self.solver.push();
    }

    pub(crate) fn increase_decision_lvl(&mut self) {
        self.decision_lvl = self.decision_lvl.successor();
        debug_assert_eq!(self.push_count, self.decision_lvl.as_usize());
    }

    /// Pops one decision level, retracting determinizations, implication
    /// registrations, constants, and adapter clauses of the popped level.
    pub(crate) fn pop(&mut self) {
        if self.push_count == 0 {
            warn!("pop on empty Skolem stack");
            debug_assert!(false, "pop on empty Skolem stack");
            return;
        }
        self.push_count -= 1;
        let new_lvl = DecLvl::from_usize(self.decision_lvl.as_usize() - 1);
        self.decision_lvl = new_lvl;
        self.solver.pop_to(new_lvl.as_usize());

        while matches!(self.trail.last(), Some(&(lvl, _)) if lvl > new_lvl) {
            let (_, var) = self.trail.pop().expect("trail is non-empty");
            self.deterministic[var] = false;
            self.dec_lvls[var] = None;
        }
        while matches!(self.constants_trail.last(), Some(&(lvl, _)) if lvl > new_lvl) {
            let (_, var) = self.constants_trail.pop().expect("constants trail is non-empty");
            self.constants[var] = None;
        }
        for imps in self.implications.values_mut() {
            for removed in imps.backtrack_to(new_lvl) {
                self.registration[removed.as_index()] = None;
            }
        }
        self.reseed_candidates();
        if self.state == SkolemState::SkolemConflict {
            self.state = SkolemState::Ready;
            self.conflict = None;
        }
    }

    /// Forgets a recoverable conflict; the conflicted variable becomes a
    /// propagation candidate again. A constants conflict is terminal and
    /// not cleared.
    pub(crate) fn clear_conflict(&mut self) {
        if self.state == SkolemState::SkolemConflict {
            self.state = SkolemState::Ready;
            self.conflict = None;
            self.reseed_candidates();
        }
    }

    /// A model of the adapter restricted to the universal variables, if the
    /// adapter is satisfiable.
    pub(crate) fn adapter_universal_model(&mut self, qcnf: &QCNF) -> Option<Vec<Lit>> {
        match self.solver.solve() {
            Ok(true) => {
                let model = self.solver.orig_model()?;
                Some(model.into_iter().filter(|l| qcnf.is_universal(l.var())).collect())
            }
            _ => None,
        }
    }

    fn reseed_candidates(&mut self) {
        self.candidates.clear();
        for (var, _) in self.deterministic.iter() {
            if !self.deterministic[var]
                && (!self.implications[var.positive()].is_empty()
                    || !self.implications[var.negative()].is_empty())
            {
                self.candidates.push(var);
            }
        }
    }

    /// Notifies the domain of a clause appended to the QCNF.
    pub(crate) fn new_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        self.ensure_clause_count(qcnf.clauses().len());
        let remaining: Vec<Lit> = qcnf
            .clause(clause_id)
            .iter()
            .filter(|l| qcnf.is_existential(l.var()) && !self.deterministic[l.var()])
            .copied()
            .collect();
        match remaining[..] {
            [] => self.check_determined_clause(qcnf, clause_id),
            [lit] => self.register_implication(qcnf, clause_id, lit),
            _ => {}
        }
    }

    /// A clause over deterministic variables only constrains the functions
    /// chosen so far: check it and add it to the encoding.
    fn check_determined_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        if self.is_conflicted() {
            return;
        }
        let clause = qcnf.clause(clause_id);
        let negated: Vec<_> = clause.iter().map(|&l| self.solver.lookup(!l)).collect();
        self.stats.conflict_checks += 1;
        match self.solver.solve_with(&negated) {
            Ok(true) => {
                let assignment = self.model_over_deterministic(qcnf);
                let var = clause
                    .iter()
                    .filter(|l| qcnf.is_existential(l.var()))
                    .max_by_key(|l| self.get_decision_lvl(l.var()))
                    .map(|l| l.var())
                    .expect("determined clause contains an existential literal");
                debug!("determined clause {clause} is violated, conflict on {var}");
                self.state = SkolemState::SkolemConflict;
                self.conflict = Some(SkolemConflict { var, clause: clause_id, assignment });
            }
            Ok(false) => {
                self.solver.add_scoped_clause_lits(clause.lits());
            }
            Err(err) => {
                warn!("SAT adapter failed: {err}");
                self.state = SkolemState::SkolemConflict;
            }
        }
    }

    fn register_implication(&mut self, qcnf: &QCNF, clause_id: ClauseId, lit: Lit) {
        self.ensure_clause_count(qcnf.clauses().len());
        if self.registration[clause_id.as_index()].is_some() {
            return;
        }
        trace!("clause {} implies {lit}", qcnf.clause(clause_id));
        self.registration[clause_id.as_index()] = Some(self.decision_lvl);
        self.implications[lit].add(clause_id, self.decision_lvl);
        self.candidates.push(lit.var());

        // all other literals constant-false makes `lit` a constant
        let forced = qcnf
            .clause(clause_id)
            .iter()
            .filter(|l| l.var() != lit.var())
            .all(|&l| self.lit_is_constant_false(l));
        if forced {
            self.set_constant(lit, self.decision_lvl);
        }
    }

    fn lit_is_constant_false(&self, lit: Lit) -> bool {
        self.constants[lit.var()].map_or(false, |c| c.value == lit.is_negative())
    }

    fn set_constant(&mut self, lit: Lit, lvl: DecLvl) {
        let var = lit.var();
        match self.constants[var] {
            Some(existing) if existing.value != lit.is_positive() => {
                if self.decision_lvl.is_root() {
                    debug!("contradicting constants on {var}");
                    self.state = SkolemState::ConstantsConflict;
                }
                // above the root the regular conflict check catches this
            }
            Some(_) => {}
            None => {
                self.constants[var] = Some(Constant { value: lit.is_positive(), dec_lvl: lvl });
                self.constants_trail.push((lvl, var));
            }
        }
    }

    pub(crate) fn is_registered(&self, clause_id: ClauseId) -> bool {
        self.registration.get(clause_id.as_index()).map_or(false, Option::is_some)
    }

    pub(crate) fn implications(&self, lit: Lit) -> &Implications {
        &self.implications[lit]
    }

    /// Propagates until saturation: no clause forces a currently
    /// nondeterministic variable anymore, or a conflict was found.
    ///
    /// Only fully forced variables are determinized here; a variable whose
    /// implication antecedents leave part of the universal space open must
    /// wait for a decision, which supplies the default polarity.
    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        while self.state == SkolemState::Ready {
            let Some(var) = self.candidates.pop() else {
                return;
            };
            if self.deterministic[var] {
                continue;
            }
            self.stats.propagations += 1;
            if !self.is_fully_forced(qcnf, var) {
                continue;
            }
            if let Some((clause, assignment)) = self.check_conflicted(qcnf, var) {
                debug!("{var} is conflicted");
                self.state = SkolemState::SkolemConflict;
                self.conflict = Some(SkolemConflict { var, clause, assignment });
                return;
            }
            self.determinize(qcnf, var, None);
        }
    }

    /// Takes a decision on a nondeterministic existential: determinize it
    /// with the decided phase as default polarity.
    pub(crate) fn decision(&mut self, qcnf: &QCNF, lit: Lit) {
        let var = lit.var();
        if qcnf.is_universal(var) || self.deterministic[var] {
            warn!("illegal decision variable {var}");
            debug_assert!(false, "illegal decision variable");
            return;
        }
        trace!("decision {lit} at lvl {}", self.decision_lvl);
        if let Some((clause, assignment)) = self.check_conflicted(qcnf, var) {
            debug!("decision variable {var} is conflicted");
            self.state = SkolemState::SkolemConflict;
            self.conflict = Some(SkolemConflict { var, clause, assignment });
            return;
        }
        self.determinize(qcnf, var, Some(lit.is_positive()));
    }

    /// SAT query: does some implication antecedent of `var` fire under
    /// every assignment the adapter still admits? Only then do the
    /// implication clauses define a total function.
    fn is_fully_forced(&mut self, qcnf: &QCNF, var: Var) -> bool {
        self.stats.determinicity_checks += 1;
        let clause_ids: Vec<ClauseId> = self.implications[var.positive()]
            .iter()
            .chain(self.implications[var.negative()].iter())
            .collect();
        let act = self.solver.fresh_var();
        for clause_id in clause_ids {
            // the clause without `var` holds iff the antecedent does not fire
            let mut residual = vec![!act];
            let others: Vec<Lit> = qcnf
                .clause(clause_id)
                .iter()
                .filter(|l| l.var() != var)
                .copied()
                .collect();
            for l in others {
                let mapped = self.solver.lookup(l);
                residual.push(mapped);
            }
            self.solver.add_permanent_clause(&residual);
        }
        let result = self.solver.solve_with(&[act]);
        self.solver.add_permanent_clause(&[!act]);
        match result {
            Ok(unforced) => !unforced,
            Err(err) => {
                warn!("SAT adapter failed: {err}");
                false
            }
        }
    }

    /// SAT query: can implication antecedents fire on both polarities of
    /// `var` at once? Returns the witnessing clause and assignment if so.
    fn check_conflicted(
        &mut self,
        qcnf: &QCNF,
        var: Var,
    ) -> Option<(ClauseId, HashSet<Lit>)> {
        if self.implications[var.positive()].is_empty()
            || self.implications[var.negative()].is_empty()
        {
            return None;
        }
        self.stats.conflict_checks += 1;
        let act = self.solver.fresh_var();
        for lit in [var.positive(), var.negative()] {
            let mut fired = vec![!act];
            let clause_ids: Vec<ClauseId> = self.implications[lit].iter().collect();
            for clause_id in clause_ids {
                let arbiter = self.solver.fresh_var();
                let antecedent: Vec<Lit> = qcnf
                    .clause(clause_id)
                    .iter()
                    .filter(|l| l.var() != var)
                    .map(|&l| !l)
                    .collect();
                for l in antecedent {
                    let mapped = self.solver.lookup(l);
                    self.solver.add_permanent_clause(&[!arbiter, mapped]);
                }
                fired.push(arbiter);
            }
            self.solver.add_permanent_clause(&fired);
        }
        let result = self.solver.solve_with(&[act]);
        self.solver.add_permanent_clause(&[!act]);
        match result {
            Ok(true) => {
                let assignment = self.model_over_deterministic(qcnf);
                let clause = self
                    .find_fired_clause(qcnf, var, &assignment)
                    .expect("some implication clause fired in the conflict model");
                Some((clause, assignment))
            }
            Ok(false) => None,
            Err(err) => {
                warn!("SAT adapter failed: {err}");
                None
            }
        }
    }

    fn model_over_deterministic(&mut self, qcnf: &QCNF) -> HashSet<Lit> {
        let model = self.solver.orig_model().unwrap_or_default();
        model
            .into_iter()
            .filter(|l| self.is_deterministic(qcnf, l.var()))
            .collect()
    }

    fn find_fired_clause(
        &self,
        qcnf: &QCNF,
        var: Var,
        assignment: &HashSet<Lit>,
    ) -> Option<ClauseId> {
        for lit in [var.positive(), var.negative()] {
            for clause_id in self.implications[lit].iter() {
                let fired = qcnf
                    .clause(clause_id)
                    .iter()
                    .filter(|l| l.var() != var)
                    .all(|&l| assignment.contains(&!l));
                if fired {
                    return Some(clause_id);
                }
            }
        }
        None
    }

    /// Encodes the Skolem function of `var` into the adapter: every
    /// implication clause, plus, for decisions, a completion forcing the
    /// default polarity whenever no opposing antecedent fires. Fully forced
    /// variables need no completion.
    fn determinize(&mut self, qcnf: &QCNF, var: Var, default_polarity: Option<bool>) {
        trace!("determinize {var} (default {default_polarity:?}) at lvl {}", self.decision_lvl);
        self.stats.determinizations += 1;
        self.deterministic[var] = true;
        self.dec_lvls[var] = Some(self.decision_lvl);
        self.trail.push((self.decision_lvl, var));

        let clause_ids: Vec<ClauseId> = self.implications[var.positive()]
            .iter()
            .chain(self.implications[var.negative()].iter())
            .collect();
        for clause_id in clause_ids {
            let lits: Vec<Lit> = qcnf.clause(clause_id).lits().to_vec();
            self.solver.add_scoped_clause_lits(&lits);
        }

        if let Some(default_polarity) = default_polarity {
            let default = var.lit(default_polarity);
            let mut completion = vec![self.solver.lookup(default)];
            let opposing: Vec<ClauseId> = self.implications[!default].iter().collect();
            for clause_id in opposing {
                let arbiter = self.solver.fresh_var();
                let antecedent: Vec<Lit> = qcnf
                    .clause(clause_id)
                    .iter()
                    .filter(|l| l.var() != var)
                    .map(|&l| !l)
                    .collect();
                for l in antecedent {
                    let mapped = self.solver.lookup(l);
                    self.solver.add_scoped_clause(&[!arbiter, mapped]);
                }
                completion.push(arbiter);
            }
            self.solver.add_scoped_clause(&completion);
        }

        self.scan_occurrences(qcnf, var);
    }

    /// New unique consequences become visible when `var` leaves the
    /// nondeterministic set.
    fn scan_occurrences(&mut self, qcnf: &QCNF, var: Var) {
        for lit in [var.positive(), var.negative()] {
            for &clause_id in qcnf.occs(lit) {
                if self.is_registered(clause_id) {
                    continue;
                }
                let mut candidate = None;
                let mut remaining = 0;
                for &l in qcnf.clause(clause_id).iter() {
                    if qcnf.is_existential(l.var()) && !self.deterministic[l.var()] {
                        remaining += 1;
                        candidate = Some(l);
                    }
                }
                if remaining == 1 {
                    let l = candidate.expect("exactly one literal remained");
                    self.register_implication(qcnf, clause_id, l);
                }
            }
        }
    }
}

/// Conflict-analysis capabilities of the Skolem domain, reading the model
/// of the failed conflict check.
pub(crate) struct SkolemDomain<'a> {
    pub(crate) skolem: &'a Skolem,
    pub(crate) qcnf: &'a QCNF,
}

impl<'a> ConflictDomain for SkolemDomain<'a> {
    fn value_of(&self, lit: Lit) -> Option<bool> {
        let conflict = self.skolem.conflict.as_ref()?;
        if conflict.assignment.contains(&lit) {
            Some(true)
        } else if conflict.assignment.contains(&!lit) {
            Some(false)
        } else {
            None
        }
    }

    fn is_relevant_clause(&self, clause_id: ClauseId) -> bool {
        self.skolem.is_registered(clause_id)
    }

    fn is_legal_dependence(&self, of: Var, on: Var) -> bool {
        self.qcnf.is_universal(on)
            || self.qcnf.var(on).scope() <= self.qcnf.var(of).scope()
    }

    fn decision_lvl_of(&self, var: Var) -> DecLvl {
        if self.qcnf.is_universal(var) {
            DecLvl::ROOT
        } else {
            self.skolem.dec_lvls[var].unwrap_or(self.skolem.decision_lvl)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn skolem_for(qcnf: &QCNF) -> Skolem {
        let mut skolem = Skolem::default();
        skolem.set_var_count(qcnf.get_var_count());
        for clause_id in qcnf.clauses().ids() {
            skolem.new_clause(qcnf, clause_id);
        }
        skolem
    }

    #[test]
    fn propagation_determinizes_forced_variable() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            -1 2;
        ];
        let mut skolem = skolem_for(&qcnf);
        skolem.propagate(&qcnf);
        assert!(!skolem.is_conflicted());
        assert!(skolem.is_deterministic(&qcnf, Var::from_dimacs(2)));
        assert!(skolem.has_empty_domain(&qcnf));
    }

    #[test]
    fn both_polarities_fire_is_a_conflict() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            1 -2;
            -1 2;
            -1 -2;
        ];
        let mut skolem = skolem_for(&qcnf);
        skolem.propagate(&qcnf);
        assert_eq!(skolem.state(), SkolemState::SkolemConflict);
        let conflict = skolem.conflict().unwrap();
        assert_eq!(conflict.var, Var::from_dimacs(2));
        // the witnessing assignment fixes the universal
        assert!(
            conflict.assignment.contains(&Lit::from_dimacs(1))
                || conflict.assignment.contains(&Lit::from_dimacs(-1))
        );
    }

    #[test]
    fn contradicting_constants() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            2;
            -2;
            1 2;
        ];
        let mut skolem = skolem_for(&qcnf);
        assert_eq!(skolem.state(), SkolemState::ConstantsConflict);
    }

    #[test]
    fn push_pop_restores_determinization() {
        let qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            -1 2;
            -2 -3 1;
        ];
        let mut skolem = skolem_for(&qcnf);
        skolem.propagate(&qcnf);
        let v3 = Var::from_dimacs(3);
        assert!(!skolem.is_deterministic(&qcnf, v3));

        skolem.push();
        skolem.increase_decision_lvl();
        skolem.decision(&qcnf, Lit::from_dimacs(3));
        assert!(skolem.is_deterministic(&qcnf, v3));
        assert_eq!(skolem.get_decision_lvl(v3), DecLvl::from_usize(1));

        skolem.pop();
        assert!(!skolem.is_deterministic(&qcnf, v3));
        assert_eq!(skolem.decision_lvl(), DecLvl::ROOT);
    }

    #[test]
    fn constant_level_is_recorded() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            2;
            -1 2;
        ];
        let mut skolem = skolem_for(&qcnf);
        skolem.propagate(&qcnf);
        let v2 = Var::from_dimacs(2);
        assert_eq!(skolem.get_dlvl_for_constant(v2), Some(DecLvl::ROOT));
    }
}
