//! Blocked clause elimination for quantified CNF.
//!
//! A clause is blocked on an existential literal `l` when every resolvent
//! with a clause containing `¬l` is tautological on a literal bound no
//! later than `l`. Blocked clauses can be removed without changing the
//! truth of the formula; the pass iterates to a fixpoint.

use crate::{literal::Lit, qcnf::QCNF};
use tracing::info;

pub fn blocked_clause_elimination(qcnf: &mut QCNF) {
    let num_clauses = qcnf.clauses().len();
    let mut blocked = vec![false; num_clauses];

    loop {
        let mut changed = false;
        for (id, clause) in qcnf.clauses().iter() {
            if blocked[id.as_index()] {
                continue;
            }
            let blocking_lit = clause
                .iter()
                .filter(|l| qcnf.is_existential(l.var()))
                .find(|&&l| {
                    qcnf.occs(!l)
                        .iter()
                        .filter(|&&other| !blocked[other.as_index()])
                        .all(|&other| tautological_resolvent(qcnf, clause.lits(), l, other))
                });
            if blocking_lit.is_some() {
                blocked[id.as_index()] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let removed = blocked.iter().filter(|&&b| b).count();
    if removed == 0 {
        return;
    }
    info!("blocked clause elimination removed {removed} of {num_clauses} clauses");

    // rebuild the store without the blocked clauses
    let mut rebuilt = QCNF::default();
    for scope in qcnf.prefix() {
        rebuilt.quantify(scope.quantifier, &scope.variables);
    }
    for &lit in qcnf.universal_constraints() {
        rebuilt.add_lit(lit);
        let _ = rebuilt.close_clause(true);
    }
    for (id, clause) in qcnf.clauses().iter() {
        if blocked[id.as_index()] {
            continue;
        }
        for &lit in clause.iter() {
            rebuilt.add_lit(lit);
        }
        let _ = rebuilt.close_clause(clause.is_original());
    }
    *qcnf = rebuilt;
}

/// Whether resolving `clause` with the clause `other` on `lit` yields a
/// tautology on a literal bound no later than `lit`'s variable.
fn tautological_resolvent(
    qcnf: &QCNF,
    clause: &[Lit],
    lit: Lit,
    other: crate::clause::db::ClauseId,
) -> bool {
    let other = qcnf.clause(other);
    clause.iter().filter(|&&k| k != lit).any(|&k| {
        other.contains(!k) && qcnf.var(k.var()).scope() <= qcnf.var(lit.var()).scope()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pure_literal_clauses_cascade() {
        // 3 occurs only positively; once its clauses are gone, 2 is pure
        let mut qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2;
            -2 3;
            2 3;
        ];
        blocked_clause_elimination(&mut qcnf);
        assert_eq!(qcnf.clauses().len(), 0);
    }

    #[test]
    fn tautological_resolvents_block() {
        // resolving on 2 always produces the tautology 3 / -3
        let mut qcnf = qcnf_formula![
            e 1 2 3;
            1 2 3;
            -2 -3;
        ];
        blocked_clause_elimination(&mut qcnf);
        assert!(qcnf.clauses().len() < 2);
    }

    #[test]
    fn unblocked_formula_is_unchanged() {
        // every resolvent is non-tautological, nothing can be removed
        let mut qcnf = qcnf_formula![
            e 1 2;
            1 2;
            -1 2;
            1 -2;
            -1 -2;
        ];
        blocked_clause_elimination(&mut qcnf);
        assert_eq!(qcnf.clauses().len(), 4);
    }
}
