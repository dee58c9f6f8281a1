//! Bounded cache of universal counterexamples.
//!
//! Each entry is a partial assignment rooted in a universal assignment that
//! once witnessed a conflict. Entries are propagated under the current
//! search state so that repeating an old mistake is detected before the
//! Skolem domain has to run a SAT query.

use super::{conflict::ConflictDomain, skolem::Skolem, DecLvl};
use crate::{
    clause::db::ClauseId,
    datastructure::VarVec,
    literal::{Lit, Lits, Var},
    qcnf::QCNF,
};
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseStatus {
    Satisfied,
    Falsified,
    Unit(Lit),
    Unresolved,
}

/// A partial assignment with a trail, per-variable decision levels, and
/// unit propagation over the occurrence lists.
#[derive(Debug, Clone, Default)]
pub(crate) struct PartialAssignment {
    assignment: VarVec<Option<bool>>,
    dec_lvls: VarVec<Option<DecLvl>>,
    /// assignments in chronological order
    trail: Vec<Lit>,
    /// indices into the trail marking the decision levels
    level_marks: Vec<usize>,
    queue: VecDeque<Lit>,
    conflict: Option<(ClauseId, Var)>,
    /// a pop or a new clause invalidates incremental propagation
    needs_full_scan: bool,
    /// a clause propagation pretends not to exist; used when the clause
    /// itself is being minimized
    ignored: Option<ClauseId>,
}

impl PartialAssignment {
    pub(crate) fn new(var_count: usize) -> Self {
        let mut pa = Self::default();
        pa.assignment.set_var_count(var_count);
        pa.dec_lvls.set_var_count(var_count);
        pa.needs_full_scan = true;
        pa
    }

    pub(crate) fn with_ignored(var_count: usize, ignored: ClauseId) -> Self {
        let mut pa = Self::new(var_count);
        pa.ignored = Some(ignored);
        pa
    }

    pub(crate) fn clear_conflict(&mut self) {
        if self.conflict.take().is_some() {
            self.needs_full_scan = true;
        }
    }

    pub(crate) fn decision_lvl(&self) -> DecLvl {
        DecLvl::from_usize(self.level_marks.len())
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.conflict.is_some()
    }

    pub(crate) fn conflicted_clause(&self) -> Option<ClauseId> {
        self.conflict.map(|(clause, _)| clause)
    }

    pub(crate) fn conflicted_var(&self) -> Option<Var> {
        self.conflict.map(|(_, var)| var)
    }

    pub(crate) fn value(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.var()].map(|value| value == lit.is_positive())
    }

    pub(crate) fn is_assigned(&self, var: Var) -> bool {
        self.assignment[var].is_some()
    }

    pub(crate) fn get_decision_lvl(&self, var: Var) -> DecLvl {
        self.dec_lvls[var].unwrap_or(DecLvl::ROOT)
    }

    pub(crate) fn assign(&mut self, lit: Lit) {
        if self.is_assigned(lit.var()) {
            debug_assert_eq!(self.value(lit), Some(true));
            return;
        }
        trace!("example assigns {lit}");
        self.assignment[lit.var()] = Some(lit.is_positive());
        self.dec_lvls[lit.var()] = Some(self.decision_lvl());
        self.trail.push(lit);
        self.queue.push_back(lit);
    }

    pub(crate) fn push(&mut self) {
        self.level_marks.push(self.trail.len());
    }

    pub(crate) fn pop(&mut self) {
        let Some(mark) = self.level_marks.pop() else {
            debug_assert!(false, "pop on empty example stack");
            return;
        };
        for lit in self.trail.drain(mark..) {
            self.assignment[lit.var()] = None;
            self.dec_lvls[lit.var()] = None;
        }
        self.queue.clear();
        self.conflict = None;
        self.needs_full_scan = true;
    }

    fn clause_status(&self, qcnf: &QCNF, clause_id: ClauseId) -> ClauseStatus {
        let mut unassigned = None;
        let mut unassigned_count = 0;
        for &l in qcnf.clause(clause_id).iter() {
            match self.value(l) {
                Some(true) => return ClauseStatus::Satisfied,
                Some(false) => {}
                None => {
                    unassigned_count += 1;
                    unassigned = Some(l);
                }
            }
        }
        match unassigned_count {
            0 => ClauseStatus::Falsified,
            1 => ClauseStatus::Unit(unassigned.expect("a literal is unassigned")),
            _ => ClauseStatus::Unresolved,
        }
    }

    fn handle_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        if self.ignored == Some(clause_id) {
            return;
        }
        match self.clause_status(qcnf, clause_id) {
            ClauseStatus::Falsified => {
                let var = qcnf
                    .clause(clause_id)
                    .iter()
                    .max_by_key(|l| (qcnf.is_existential(l.var()), self.get_decision_lvl(l.var())))
                    .map(|l| l.var())
                    .expect("falsified clause is non-empty");
                debug!("example falsifies clause {}", qcnf.clause(clause_id));
                self.conflict = Some((clause_id, var));
            }
            ClauseStatus::Unit(lit) => self.assign(lit),
            ClauseStatus::Satisfied | ClauseStatus::Unresolved => {}
        }
    }

    /// Propagates units until fixpoint or conflict.
    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        if self.is_conflicted() {
            return;
        }
        if self.needs_full_scan {
            self.needs_full_scan = false;
            for clause_id in qcnf.clauses().ids() {
                self.handle_clause(qcnf, clause_id);
                if self.is_conflicted() {
                    return;
                }
            }
        }
        while let Some(lit) = self.queue.pop_front() {
            let falsified: Vec<ClauseId> = qcnf.occs(!lit).to_vec();
            for clause_id in falsified {
                self.handle_clause(qcnf, clause_id);
                if self.is_conflicted() {
                    return;
                }
            }
        }
    }

    pub(crate) fn new_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        if !self.is_conflicted() {
            self.handle_clause(qcnf, clause_id);
        }
    }
}

/// Conflict-analysis capabilities of a partial assignment.
pub(crate) struct PartialAssignmentDomain<'a> {
    pub(crate) pa: &'a PartialAssignment,
    pub(crate) qcnf: &'a QCNF,
}

impl<'a> ConflictDomain for PartialAssignmentDomain<'a> {
    fn value_of(&self, lit: Lit) -> Option<bool> {
        self.pa.value(lit)
    }

    fn is_relevant_clause(&self, _clause_id: ClauseId) -> bool {
        // examples are kept consistent with every clause of the QCNF
        true
    }

    fn is_legal_dependence(&self, of: Var, on: Var) -> bool {
        self.qcnf.is_universal(on) || self.qcnf.var(on).scope() <= self.qcnf.var(of).scope()
    }

    fn decision_lvl_of(&self, var: Var) -> DecLvl {
        self.pa.get_decision_lvl(var)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Examples {
    max_num: usize,
    examples: VecDeque<PartialAssignment>,
    conflicted_idx: Option<usize>,
    push_count: usize,
}

impl Examples {
    pub(crate) fn new(max_num: usize) -> Self {
        Self { max_num, ..Self::default() }
    }

    pub(crate) fn len(&self) -> usize {
        self.examples.len()
    }

    pub(crate) fn push_count(&self) -> usize {
        self.push_count
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.conflicted_idx.is_some()
    }

    pub(crate) fn conflicted_assignment(&self) -> Option<&PartialAssignment> {
        self.conflicted_idx.map(|idx| &self.examples[idx])
    }

    pub(crate) fn propagate(&mut self, qcnf: &QCNF) {
        if self.is_conflicted() {
            return;
        }
        for (idx, pa) in self.examples.iter_mut().enumerate() {
            pa.propagate(qcnf);
            if pa.is_conflicted() {
                debug!("example {idx} is conflicted");
                self.conflicted_idx = Some(idx);
                return;
            }
        }
    }

    pub(crate) fn push(&mut self) {
        self.push_count += 1;
        for pa in &mut self.examples {
            pa.push();
        }
    }

    pub(crate) fn pop(&mut self) {
        debug_assert!(self.push_count > 0);
        self.push_count -= 1;
        for pa in &mut self.examples {
            pa.pop();
        }
        self.conflicted_idx = None;
    }

    /// Forgets the current conflict; entries re-propagate from scratch.
    pub(crate) fn clear_conflict(&mut self) {
        self.conflicted_idx = None;
        for pa in &mut self.examples {
            pa.clear_conflict();
        }
    }

    /// Removes the conflicted entry entirely.
    pub(crate) fn drop_conflicted(&mut self) {
        if let Some(idx) = self.conflicted_idx.take() {
            let _ = self.examples.remove(idx);
        }
    }

    /// Extends every example consistently with the Skolem function the
    /// decision introduces: the negated phase exactly when one of the
    /// opposing implication clauses fires under the example.
    pub(crate) fn decision_consistent_with_skolem(
        &mut self,
        qcnf: &QCNF,
        skolem: &Skolem,
        lit: Lit,
    ) {
        for pa in &mut self.examples {
            if pa.is_assigned(lit.var()) || pa.is_conflicted() {
                continue;
            }
            let opposing_fires = skolem.implications(!lit).iter().any(|clause_id| {
                qcnf.clause(clause_id)
                    .iter()
                    .filter(|l| l.var() != lit.var())
                    .all(|&l| pa.value(l) == Some(false))
            });
            let value = if opposing_fires { !lit } else { lit };
            pa.assign(value);
        }
    }

    /// Caches the universal part of a Skolem conflict as a new example,
    /// evicting the oldest entry when the bound is exceeded. Returns whether
    /// the new example is already conflicted.
    pub(crate) fn add_assignment_from_skolem(
        &mut self,
        qcnf: &QCNF,
        skolem: &Skolem,
    ) -> Option<bool> {
        if self.max_num == 0 {
            return None;
        }
        let conflict = skolem.conflict()?;
        let universals: Vec<Lit> = conflict
            .assignment
            .iter()
            .filter(|l| qcnf.is_universal(l.var()))
            .copied()
            .collect();
        debug!("caching example {}", Lits(&universals));
        let mut pa = PartialAssignment::new(qcnf.get_var_count());
        for &l in &universals {
            pa.assign(l);
        }
        pa.propagate(qcnf);
        for _ in 0..self.push_count {
            pa.push();
        }
        let conflicted = pa.is_conflicted();
        self.examples.push_back(pa);
        if self.examples.len() > self.max_num {
            self.examples.pop_front();
            self.conflicted_idx = None;
        }
        if conflicted {
            self.conflicted_idx = Some(self.examples.len() - 1);
        }
        Some(conflicted)
    }

    pub(crate) fn new_clause(&mut self, qcnf: &QCNF, clause_id: ClauseId) {
        for (idx, pa) in self.examples.iter_mut().enumerate() {
            pa.new_clause(qcnf, clause_id);
            if pa.is_conflicted() && self.conflicted_idx.is_none() {
                self.conflicted_idx = Some(idx);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_propagation_and_conflict() {
        let qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            -2 3;
            -3 -2;
        ];
        let mut pa = PartialAssignment::new(qcnf.get_var_count());
        pa.assign(Lit::from_dimacs(-1));
        pa.propagate(&qcnf);
        // -1 forces 2, 2 forces 3, and (-3 -2) is falsified
        assert!(pa.is_conflicted());
        assert_eq!(pa.value(Lit::from_dimacs(2)), Some(true));
    }

    #[test]
    fn push_pop_roundtrip() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
        ];
        let mut pa = PartialAssignment::new(qcnf.get_var_count());
        pa.assign(Lit::from_dimacs(1));
        pa.propagate(&qcnf);
        assert!(!pa.is_assigned(Var::from_dimacs(2)));

        pa.push();
        pa.assign(Lit::from_dimacs(-2));
        assert_eq!(pa.decision_lvl(), DecLvl::from_usize(1));
        assert_eq!(pa.get_decision_lvl(Var::from_dimacs(2)), DecLvl::from_usize(1));

        pa.pop();
        assert!(!pa.is_assigned(Var::from_dimacs(2)));
        assert_eq!(pa.decision_lvl(), DecLvl::ROOT);
        assert_eq!(pa.value(Lit::from_dimacs(1)), Some(true));
    }

    #[test]
    fn bounded_eviction() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            1 2;
            -1 2;
        ];
        let mut examples = Examples::new(2);
        for _ in 0..3 {
            let mut pa = PartialAssignment::new(qcnf.get_var_count());
            pa.assign(Lit::from_dimacs(1));
            examples.examples.push_back(pa);
            if examples.examples.len() > examples.max_num {
                examples.examples.pop_front();
            }
        }
        assert_eq!(examples.len(), 2);
    }
}
