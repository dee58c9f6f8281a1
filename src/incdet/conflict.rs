//! First-order conflict analysis, shared between the Skolem and the
//! Examples domains.

use super::DecLvl;
use crate::{
    clause::db::ClauseId,
    literal::{Lit, Lits, Var},
    qcnf::QCNF,
};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Capabilities a domain must provide for conflict analysis.
pub(crate) trait ConflictDomain {
    /// The value of `lit` in the conflicting assignment, if any.
    fn value_of(&self, lit: Lit) -> Option<bool>;
    /// Whether the clause takes part in the domain's current reasoning.
    fn is_relevant_clause(&self, clause_id: ClauseId) -> bool;
    /// Whether the definition of `of` may depend on `on`.
    fn is_legal_dependence(&self, of: Var, on: Var) -> bool;
    fn decision_lvl_of(&self, var: Var) -> DecLvl;
}

/// Derives a conflict cube by first-order resolution.
///
/// The cube consists of literals that are true in the conflicting
/// assignment; its negation is the learnt clause. Starting from the
/// negated literals of the conflicted clause, the analysis resolves the
/// pivot with the largest decision level (ties broken by variable id)
/// against the clause that forced it, until at most one literal of the
/// conflict level remains.
#[derive(Debug, Default)]
pub(crate) struct ConflictAnalysis {
    cube: Vec<Lit>,
    resolved: HashSet<Var>,
}

impl ConflictAnalysis {
    pub(crate) fn analyze<D: ConflictDomain>(
        &mut self,
        qcnf: &QCNF,
        domain: &D,
        conflict_var: Var,
        conflict_clause: ClauseId,
        conflict_lvl: DecLvl,
    ) -> Vec<Lit> {
        self.cube.clear();
        self.resolved.clear();
        self.resolved.insert(conflict_var);

        // Seed with the conflicted clause. A literal without a value in the
        // domain (the conflicted variable) is resolved away immediately
        // against the opposing clause that forced its negation.
        let seed: Vec<Lit> = qcnf.clause(conflict_clause).lits().to_vec();
        for lit in seed {
            if domain.value_of(lit) == Some(false) {
                self.add(!lit);
            } else if let Some(others) = self.find_reason(qcnf, domain, !lit) {
                for other in others {
                    self.add(other);
                }
            } else {
                warn!("no reason for unvalued literal {lit} in the conflicted clause");
                debug_assert!(false, "unvalued literal without reason");
            }
        }
        debug!("conflict cube before analysis: {}", Lits(&self.cube));

        loop {
            let at_conflict_lvl = self
                .cube
                .iter()
                .filter(|l| domain.decision_lvl_of(l.var()) == conflict_lvl)
                .count();
            if at_conflict_lvl <= 1 {
                break;
            }
            let Some(pivot) = self.pick_pivot(qcnf, domain) else {
                break;
            };
            let Some(others) = self.find_reason(qcnf, domain, pivot) else {
                self.resolved.insert(pivot.var());
                continue;
            };
            trace!("resolving on {pivot}");
            self.resolved.insert(pivot.var());
            self.cube.retain(|&l| l != pivot);
            for other in others {
                self.add(other);
            }
            trace!("derived cube: {}", Lits(&self.cube));
        }

        debug!("conflict cube: {}", Lits(&self.cube));
        self.cube.clone()
    }

    fn add(&mut self, lit: Lit) {
        if !self.cube.contains(&lit) {
            self.cube.push(lit);
        }
    }

    /// The unresolved existential cube literal with the largest decision
    /// level; ties are broken by variable id.
    fn pick_pivot<D: ConflictDomain>(&self, qcnf: &QCNF, domain: &D) -> Option<Lit> {
        self.cube
            .iter()
            .filter(|l| qcnf.is_existential(l.var()))
            .filter(|l| !self.resolved.contains(&l.var()))
            .copied()
            .max_by(|a, b| {
                domain
                    .decision_lvl_of(a.var())
                    .cmp(&domain.decision_lvl_of(b.var()))
                    .then_with(|| b.var().cmp(&a.var()))
            })
    }

    /// A relevant clause that forced `lit`: it contains `lit`, all its
    /// other literals are false in the domain, and all of them are legal
    /// dependencies of `lit`'s variable. Returns the negations of the other
    /// literals.
    fn find_reason<D: ConflictDomain>(
        &self,
        qcnf: &QCNF,
        domain: &D,
        lit: Lit,
    ) -> Option<Vec<Lit>> {
        'clauses: for &clause_id in qcnf.occs(lit) {
            if !domain.is_relevant_clause(clause_id) {
                continue;
            }
            let mut others = Vec::new();
            for &l in qcnf.clause(clause_id).iter() {
                if l == lit {
                    continue;
                }
                if domain.value_of(l) != Some(false)
                    || !domain.is_legal_dependence(lit.var(), l.var())
                {
                    continue 'clauses;
                }
                others.push(!l);
            }
            return Some(others);
        }
        None
    }
}

/// The second-largest distinct decision level, or the root level if fewer
/// than two distinct levels occur.
pub(crate) fn second_largest_distinct_lvl(lvls: impl Iterator<Item = DecLvl>) -> DecLvl {
    let mut lvls: Vec<DecLvl> = lvls.collect();
    lvls.sort_unstable();
    lvls.dedup();
    if lvls.len() >= 2 {
        lvls[lvls.len() - 2]
    } else {
        DecLvl::ROOT
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn second_largest() {
        let lvl = |l| DecLvl::from_usize(l);
        assert_eq!(
            second_largest_distinct_lvl([lvl(3), lvl(1), lvl(3), lvl(0)].into_iter()),
            lvl(1)
        );
        assert_eq!(second_largest_distinct_lvl([lvl(2), lvl(2)].into_iter()), DecLvl::ROOT);
        assert_eq!(second_largest_distinct_lvl(std::iter::empty()), DecLvl::ROOT);
        assert_eq!(second_largest_distinct_lvl([lvl(0), lvl(4)].into_iter()), DecLvl::ROOT);
    }
}
