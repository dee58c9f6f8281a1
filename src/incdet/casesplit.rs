//! Case-split driver: temporarily fixes interface literals to make
//! progress when propagation alone saturates.

use super::{skolem::Skolem, DecLvl};
use crate::{
    datastructure::VarVec,
    literal::{Lit, Lits, Var},
    qcnf::QCNF,
};
use ordered_float::OrderedFloat;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DepthPenalty {
    Linear,
    #[allow(dead_code)]
    Quadratic,
}

/// A discharged case: the assumed cube together with the Skolem functions
/// encoded while it was active (represented by the cube; the functions
/// live in the certificate pipeline).
#[derive(Debug, Clone)]
pub(crate) struct Case {
    pub(crate) cube: Vec<Lit>,
}

/// An active case-split assumption and the search position it was taken at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Assumption {
    pub(crate) lit: Lit,
    /// the decision level the assumption occupies
    pub(crate) lvl: DecLvl,
    /// the restart base to restore when stepping out
    pub(crate) prev_restart_base: DecLvl,
}

#[derive(Debug)]
pub(crate) struct Casesplits {
    /// existentials on the quantifier frontier: not deterministic after the
    /// initial propagation and co-occurring with universals
    interface_vars: Vec<Var>,
    interface_activities: VarVec<f64>,
    /// currently assumed case-split literals, outermost first
    assumptions: Vec<Assumption>,
    closed_cases: Vec<Case>,
    depth_penalty: DepthPenalty,
    linear_depth_penalty_factor: f64,
}

impl Casesplits {
    pub(crate) fn new(depth_penalty: DepthPenalty, linear_depth_penalty_factor: f64) -> Self {
        Self {
            interface_vars: Vec::default(),
            interface_activities: VarVec::default(),
            assumptions: Vec::default(),
            closed_cases: Vec::default(),
            depth_penalty,
            linear_depth_penalty_factor,
        }
    }

    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.interface_activities.set_var_count(count);
    }

    /// Recomputes the interface after the initial propagation.
    pub(crate) fn update_interface(&mut self, qcnf: &QCNF, skolem: &Skolem) {
        self.interface_vars.clear();
        for var in qcnf.existential_vars() {
            if skolem.is_deterministic(qcnf, var) {
                continue;
            }
            let touches_universal = [var.positive(), var.negative()]
                .into_iter()
                .flat_map(|lit| qcnf.occs(lit))
                .any(|&clause_id| {
                    qcnf.clause(clause_id).iter().any(|l| qcnf.is_universal(l.var()))
                });
            if touches_universal {
                self.interface_vars.push(var);
            }
        }
        info!("interface has {} variables", self.interface_vars.len());
    }

    pub(crate) fn bump_interface_activity(&mut self, var: Var, value: f64) {
        if self.interface_vars.contains(&var) {
            self.interface_activities[var] += value;
        }
    }

    fn average_interface_activity(&self) -> f64 {
        if self.interface_vars.is_empty() {
            return 0.0;
        }
        let sum: f64 =
            self.interface_vars.iter().map(|&v| self.interface_activities[v]).sum();
        sum / self.interface_vars.len() as f64
    }

    fn depth_penalty(&self) -> f64 {
        let depth = self.assumptions.len() as f64;
        match self.depth_penalty {
            DepthPenalty::Linear => 1.0 + self.linear_depth_penalty_factor * depth,
            DepthPenalty::Quadratic => 1.0 + self.linear_depth_penalty_factor * depth * depth,
        }
    }

    /// The interface literal worth assuming, if any is notorious enough.
    ///
    /// A literal is notorious when its variable keeps appearing in learnt
    /// clauses; the threshold grows with the case-split depth.
    pub(crate) fn pick_notorious_lit(
        &self,
        qcnf: &QCNF,
        skolem: &Skolem,
        threshold_factor: f64,
    ) -> Option<Lit> {
        let threshold =
            threshold_factor * self.average_interface_activity() * self.depth_penalty();
        let var = self
            .interface_vars
            .iter()
            .filter(|&&v| !skolem.is_deterministic(qcnf, v))
            .max_by_key(|&&v| OrderedFloat(self.interface_activities[v]))
            .copied()?;
        let notoriousity = self.interface_activities[var];
        debug!("most notorious interface var {var}: {notoriousity} (threshold {threshold})");
        if notoriousity <= threshold {
            return None;
        }
        // assume the polarity that constrains more clauses
        let polarity = qcnf.occs(var.positive()).len() >= qcnf.occs(var.negative()).len();
        Some(var.lit(polarity))
    }

    pub(crate) fn begin_case(&mut self, assumption: Assumption) {
        debug!(
            "case split on {} at depth {}",
            assumption.lit,
            self.assumptions.len()
        );
        self.assumptions.push(assumption);
    }

    pub(crate) fn has_active_assumptions(&self) -> bool {
        !self.assumptions.is_empty()
    }

    /// Records the current assumption cube as discharged and steps out of
    /// the innermost assumption.
    pub(crate) fn close_case(&mut self) -> Option<Assumption> {
        let case = Case { cube: self.assumptions.iter().map(|a| a.lit).collect() };
        info!("closing case {}", Lits(&case.cube));
        self.closed_cases.push(case);
        self.assumptions.pop()
    }

    /// Drops the innermost assumption without recording a case. Used when a
    /// learnt clause shows the assumed literal cannot be part of any
    /// strategy.
    pub(crate) fn drop_case(&mut self) -> Option<Assumption> {
        self.assumptions.pop()
    }

    /// Steps out of all active assumptions (used by the replenish pass).
    /// Returns the outermost assumption, if any was active.
    pub(crate) fn abandon_cases(&mut self) -> Option<Assumption> {
        let outermost = self.assumptions.first().copied();
        self.assumptions.clear();
        outermost
    }

    pub(crate) fn closed_cases(&self) -> &[Case] {
        &self.closed_cases
    }

    pub(crate) fn last_closed_cube(&self) -> Option<&[Lit]> {
        self.closed_cases.last().map(|case| case.cube.as_slice())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interface_detection() {
        let qcnf = qcnf_formula![
            a 1;
            e 2 3 4;
            1 2 3;
            -2 -3;
            3 4;
            -3 -4;
        ];
        let mut skolem = Skolem::default();
        skolem.set_var_count(qcnf.get_var_count());
        for clause_id in qcnf.clauses().ids() {
            skolem.new_clause(&qcnf, clause_id);
        }
        skolem.propagate(&qcnf);

        let mut cs = Casesplits::new(DepthPenalty::Linear, 1.0);
        cs.set_var_count(qcnf.get_var_count());
        cs.update_interface(&qcnf, &skolem);
        // 2 and 3 share a clause with the universal, 4 does not
        assert!(cs.interface_vars.contains(&Var::from_dimacs(2)));
        assert!(cs.interface_vars.contains(&Var::from_dimacs(3)));
        assert!(!cs.interface_vars.contains(&Var::from_dimacs(4)));
    }

    #[test]
    fn notoriousity_threshold() {
        let qcnf = qcnf_formula![
            a 1;
            e 2 3;
            1 2 3;
            -2 -3;
        ];
        let mut skolem = Skolem::default();
        skolem.set_var_count(qcnf.get_var_count());
        for clause_id in qcnf.clauses().ids() {
            skolem.new_clause(&qcnf, clause_id);
        }
        skolem.propagate(&qcnf);

        let mut cs = Casesplits::new(DepthPenalty::Linear, 1.0);
        cs.set_var_count(qcnf.get_var_count());
        cs.update_interface(&qcnf, &skolem);
        assert!(cs.pick_notorious_lit(&qcnf, &skolem, 5.0).is_none());

        for _ in 0..10 {
            cs.bump_interface_activity(Var::from_dimacs(2), 1.0);
        }
        let lit = cs.pick_notorious_lit(&qcnf, &skolem, 1.0).unwrap();
        assert_eq!(lit.var(), Var::from_dimacs(2));
    }
}
