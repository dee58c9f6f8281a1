//! Central store for a quantified CNF: variables, scopes, clauses, and
//! variable activities.
//!
//! Variables refer to clauses through occurrence lists and clauses refer to
//! variables through literals; both vectors are owned here and all
//! cross-references are indices.

use crate::{
    clause::{
        db::{ClauseDb, ClauseId},
        Clause,
    },
    datastructure::VarVec,
    literal::{Lit, Lits, Var},
    quantifier::{Scope, ScopeId},
    QuantTy,
};
use tracing::{debug, warn};

/// Activities are decayed lazily: stored values are scaled by a global
/// factor, and `decay` only touches the factor.
const ACTIVITY_FACTOR_LIMIT: f64 = 1000.0;

#[derive(Debug, Clone, Default)]
pub(crate) struct VarData {
    scope: Option<ScopeId>,
    is_universal: bool,
    pos_occs: Vec<ClauseId>,
    neg_occs: Vec<ClauseId>,
    /// stored activity, scaled by the global activity factor
    activity: f64,
}

impl VarData {
    pub(crate) fn is_bound(&self) -> bool {
        self.scope.is_some()
    }

    pub(crate) fn scope(&self) -> ScopeId {
        self.scope.expect("all variables are bound")
    }

    pub(crate) fn is_universal(&self) -> bool {
        self.is_universal
    }

    pub(crate) fn occs(&self, polarity: bool) -> &[ClauseId] {
        if polarity {
            &self.pos_occs
        } else {
            &self.neg_occs
        }
    }
}

#[derive(Debug, Clone)]
pub struct QCNF {
    vars: VarVec<VarData>,
    prefix: Vec<Scope>,
    clauses: ClauseDb,
    /// unary input clauses over universals, kept out of the matrix
    universal_constraints: Vec<Lit>,
    /// literals of the currently open clause
    building: Vec<Lit>,
    activity_factor: f64,
    /// set to true if the empty clause was added
    conflicted: bool,
}

impl Default for QCNF {
    fn default() -> Self {
        Self {
            vars: VarVec::default(),
            prefix: Vec::default(),
            clauses: ClauseDb::default(),
            universal_constraints: Vec::default(),
            building: Vec::default(),
            activity_factor: 1.0,
            conflicted: false,
        }
    }
}

impl QCNF {
    #[must_use]
    pub fn new(prefix: &[(QuantTy, &[u32])], matrix: &[&[i32]]) -> Self {
        let mut qcnf = Self::default();
        for &(quant, vars) in prefix {
            let vars: Vec<Var> = vars
                .iter()
                .map(|&var| Var::from_dimacs(var.try_into().unwrap()))
                .collect();
            qcnf.quantify(quant, &vars);
        }
        for &lits in matrix {
            for &lit in lits {
                qcnf.add_lit(Lit::from_dimacs(lit));
            }
            let _ = qcnf.close_clause(true);
        }
        qcnf
    }

    pub(crate) fn get_var_count(&self) -> usize {
        self.vars.get_var_count()
    }

    pub(crate) fn var(&self, var: Var) -> &VarData {
        &self.vars[var]
    }

    pub(crate) fn var_exists(&self, var: Var) -> bool {
        self.vars.get(var).map_or(false, VarData::is_bound)
    }

    pub(crate) fn is_universal(&self, var: Var) -> bool {
        self.vars[var].is_universal
    }

    pub(crate) fn is_existential(&self, var: Var) -> bool {
        !self.vars[var].is_universal
    }

    pub(crate) fn vars(&self) -> impl Iterator<Item = (Var, &VarData)> {
        self.vars.iter().filter(|(_, data)| data.is_bound())
    }

    pub(crate) fn clause(&self, id: ClauseId) -> &Clause {
        &self.clauses[id]
    }

    pub(crate) fn clauses(&self) -> &ClauseDb {
        &self.clauses
    }

    pub(crate) fn occs(&self, lit: Lit) -> &[ClauseId] {
        self.vars[lit.var()].occs(lit.is_positive())
    }

    pub(crate) fn universal_constraints(&self) -> &[Lit] {
        &self.universal_constraints
    }

    pub(crate) fn prefix(&self) -> &[Scope] {
        &self.prefix
    }

    pub(crate) fn is_conflicted(&self) -> bool {
        self.conflicted
    }

    pub(crate) fn reserve_clauses(&mut self, num_clauses: u32) {
        self.clauses.reserve(num_clauses);
    }

    fn ensure_var_count(&mut self, count: usize) {
        if count > self.vars.get_var_count() {
            self.vars.set_var_count(count);
        }
    }

    pub(crate) fn set_var_count(&mut self, count: usize) {
        self.ensure_var_count(count);
    }

    /// Appends `vars` to the quantifier prefix, merging into the innermost
    /// scope if the quantifier type matches.
    pub(crate) fn quantify(&mut self, quant: QuantTy, vars: &[Var]) {
        let id = match self.prefix.last_mut() {
            Some(scope) if scope.quantifier == quant => {
                scope.variables.extend_from_slice(vars);
                ScopeId(self.prefix.len() - 1)
            }
            _ => {
                let id = ScopeId(self.prefix.len());
                self.prefix.push(Scope { quantifier: quant, variables: vars.into() });
                id
            }
        };
        for &var in vars {
            self.ensure_var_count(var.as_index() + 1);
            let var_data = &mut self.vars[var];
            let other = var_data.scope.get_or_insert(id);
            if *other != id {
                // variable is bound twice, remove it from the outer scope
                self.prefix[other.0].variables.retain(|&v| v != var);
                *other = id;
            }
            var_data.is_universal = quant.is_universal();
        }
    }

    /// Declares a single variable, merging into the innermost scope of
    /// matching quantifier type.
    pub(crate) fn new_var(&mut self, is_universal: bool, var: Var) {
        let quant = if is_universal { QuantTy::Forall } else { QuantTy::Exists };
        self.quantify(quant, &[var]);
    }

    /// Adds a literal to the currently open clause. Unbound variables are
    /// bound existentially in the innermost scope.
    pub(crate) fn add_lit(&mut self, lit: Lit) {
        if !self.var_exists(lit.var()) {
            warn!("binding free variable {} existentially", lit.var());
            self.quantify(QuantTy::Exists, &[lit.var()]);
        }
        self.building.push(lit);
    }

    /// Closes the currently open clause: removes duplicate literals, drops
    /// tautologies, applies universal reduction, and appends the result to
    /// the matrix. Literal order is preserved.
    ///
    /// Returns `None` when no clause was added: for tautologies, for unary
    /// universal input clauses (recorded as universal constraints), and for
    /// clauses that reduce to the empty clause (the store becomes
    /// conflicted).
    pub(crate) fn close_clause(&mut self, original: bool) -> Option<ClauseId> {
        let mut lits = std::mem::take(&mut self.building);
        debug!("close clause: {}", Lits(&lits));

        let mut seen = Vec::with_capacity(lits.len());
        let mut tautology = false;
        lits.retain(|&l| {
            if seen.contains(&!l) {
                tautology = true;
            }
            if seen.contains(&l) {
                false
            } else {
                seen.push(l);
                true
            }
        });
        if tautology {
            debug!("dropping tautological clause");
            return None;
        }

        // universal reduction: universals bound after every existential
        // literal of the clause cannot help satisfying it
        let max_existential_scope = lits
            .iter()
            .filter(|l| self.is_existential(l.var()))
            .map(|l| self.vars[l.var()].scope())
            .max();
        if let Some(max_scope) = max_existential_scope {
            lits.retain(|l| self.vars[l.var()].scope() <= max_scope);
        } else {
            if original && lits.len() == 1 {
                // unary constraint on the universal player
                let lit = lits[0];
                debug!("universal constraint {lit}");
                self.universal_constraints.push(lit);
                return None;
            }
            warn!("empty clause after universal reduction, instance is unsatisfiable");
            self.conflicted = true;
            return None;
        }

        let id = self.clauses.add(&lits, original);
        for &lit in self.clauses[id].lits() {
            let data = &mut self.vars[lit.var()];
            if lit.is_positive() {
                data.pos_occs.push(id);
            } else {
                data.neg_occs.push(id);
            }
        }
        Some(id)
    }

    /// Removes `lit` from the given clause, updating the occurrence list.
    /// Used by conflict clause minimization.
    pub(crate) fn remove_lit_from_clause(&mut self, id: ClauseId, lit: Lit) {
        self.clauses[id].remove(lit);
        let data = &mut self.vars[lit.var()];
        let occs = if lit.is_positive() { &mut data.pos_occs } else { &mut data.neg_occs };
        occs.retain(|&c| c != id);
    }

    pub(crate) fn is_2qbf(&self) -> bool {
        matches!(
            &self.prefix[..],
            [Scope { quantifier: QuantTy::Forall, .. }, Scope { quantifier: QuantTy::Exists, .. }]
        )
    }

    pub(crate) fn is_propositional(&self) -> bool {
        self.prefix.iter().all(|scope| scope.quantifier == QuantTy::Exists)
    }

    pub(crate) fn universal_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.vars().filter(|(_, data)| data.is_universal()).map(|(var, _)| var)
    }

    pub(crate) fn existential_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.vars().filter(|(_, data)| !data.is_universal()).map(|(var, _)| var)
    }
}

/// Variable activity operations.
///
/// The effective activity of a variable is `stored / activity_factor`; decay
/// divides the factor instead of touching every stored value.
impl QCNF {
    pub(crate) fn activity_factor(&self) -> f64 {
        self.activity_factor
    }

    pub(crate) fn set_activity(&mut self, var: Var, value: f64) {
        debug_assert!(value >= 0.0);
        self.vars[var].activity = value * self.activity_factor;
    }

    pub(crate) fn get_activity(&self, var: Var) -> f64 {
        debug_assert!(self.vars[var].activity >= 0.0);
        self.vars[var].activity / self.activity_factor
    }

    pub(crate) fn bump_activity(&mut self, var: Var, value: f64) {
        debug_assert!(value >= 0.0);
        self.vars[var].activity += value * self.activity_factor;
    }

    pub(crate) fn scale_activity(&mut self, var: Var, factor: f64) {
        debug_assert!(factor > 0.0 && factor < ACTIVITY_FACTOR_LIMIT);
        self.vars[var].activity *= factor;
    }

    /// Divides the activity factor by `decay_rate`, rescaling all stored
    /// values first if the factor would exceed its limit or lose finiteness.
    pub(crate) fn decay_activity(&mut self, decay_rate: f64) {
        debug_assert!(self.activity_factor >= 1.0 && self.activity_factor.is_finite());
        let new_factor = self.activity_factor / decay_rate;
        if new_factor.is_finite()
            && self.activity_factor.recip().is_finite()
            && new_factor < ACTIVITY_FACTOR_LIMIT
        {
            self.activity_factor = new_factor;
        } else {
            self.rescale_activity_values();
            self.activity_factor /= decay_rate;
        }
    }

    /// Resets the activity factor to 1, folding it into the stored values.
    /// The effective activities are unchanged.
    pub(crate) fn rescale_activity_values(&mut self) {
        let rescale = self.activity_factor.recip();
        self.activity_factor = 1.0;
        self.vars.values_mut().for_each(|data| data.activity *= rescale);
    }
}

impl crate::qdimacs::FromQdimacs for QCNF {
    fn set_num_variables(&mut self, _: u32) {}

    fn set_num_clauses(&mut self, _: u32) {}

    fn quantify(&mut self, quant: QuantTy, vars: &[Var]) {
        QCNF::quantify(self, quant, vars);
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        for &lit in lits {
            QCNF::add_lit(self, lit);
        }
        let _ = QCNF::close_clause(self, true);
    }
}

impl std::fmt::Display for QCNF {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "p cnf {} {}", self.vars.get_var_count(), self.clauses.len())?;
        for scope in &self.prefix {
            write!(f, "{scope}")?;
        }
        for (_, clause) in self.clauses.iter() {
            writeln!(f, "{clause}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
macro_rules! qcnf_core {
    ($prefix:expr, $matrix:expr,) => {
		(crate::qcnf::QCNF::new(&$prefix, &$matrix))
	};
    ($prefix:expr, $matrix:expr, a $( $x:literal )* ; $($tail:tt)* ) => {{
		$prefix.push((crate::quantifier::QuantTy::Forall, &[ $( $x ),* ]));
        qcnf_core![$prefix, $matrix, $($tail)*]
    }};
    ($prefix:expr, $matrix:expr, e $( $x:literal )* ; $($tail:tt)* ) => {{
		$prefix.push((crate::quantifier::QuantTy::Exists, &[ $( $x ),* ]));
        qcnf_core![$prefix, $matrix,$($tail)*]
    }};
    ($prefix:expr, $matrix:expr, $( $x:literal )* ; $($tail:tt)* ) => {{
		$matrix.push(&[ $( $x ),* ]);
        qcnf_core![$prefix, $matrix, $($tail)*]
    }};
}

/// Macro that creates a [`QCNF`] instance from a QDIMACS-like representation.
/// The main differences are:
/// * No support for comments
/// * No header line
/// * Lines are seperated by `;`, whereas QDIMACS uses `0`.
///
/// # Example
/// ```
/// let qcnf = qcnf_formula![
///     a 1 2;
///     e 3;
///     1 2;
/// ];
/// ```
///
#[cfg(test)]
macro_rules! qcnf_formula {
	($($tail:tt)*) => {
		 {
			 let mut prefix: Vec<(crate::quantifier::QuantTy, &[u32])> = Vec::new();
			 let mut matrix: Vec<&[i32]> = Vec::new();
			 qcnf_core![prefix, matrix, $($tail)*]
		 }

	};
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn build_and_classify() {
        let qcnf = qcnf_formula![
            a 1 2;
            e 3;
            1 2 3;
        ];
        assert!(qcnf.is_2qbf());
        assert!(!qcnf.is_propositional());
        assert_eq!(qcnf.clauses().len(), 1);
        assert!(qcnf.is_universal(Var::from_dimacs(1)));
        assert!(qcnf.is_existential(Var::from_dimacs(3)));
    }

    #[test]
    fn tautology_dropped() {
        let qcnf = qcnf_formula![
            e 1 2;
            1 -1 2;
        ];
        assert_eq!(qcnf.clauses().len(), 0);
        assert!(!qcnf.is_conflicted());
    }

    #[test]
    fn duplicate_literals_merged_in_order() {
        let qcnf = qcnf_formula![
            e 1 2;
            2 1 2;
        ];
        let clause = qcnf.clause(qcnf.clauses().ids().next().unwrap());
        let lits: Vec<i32> = clause.iter().map(|l| l.to_dimacs()).collect();
        assert_eq!(lits, vec![2, 1]);
    }

    #[test]
    fn universal_constraint_recorded() {
        let qcnf = qcnf_formula![
            a 1;
            e 2;
            -1;
            1 2;
        ];
        assert_eq!(qcnf.universal_constraints(), &[Lit::from_dimacs(-1)]);
        assert_eq!(qcnf.clauses().len(), 1);
        assert!(!qcnf.is_conflicted());
    }

    #[test]
    fn universal_only_clause_is_conflict() {
        let qcnf = qcnf_formula![
            a 1 2;
            e 3;
            1 2;
        ];
        assert!(qcnf.is_conflicted());
    }

    #[test]
    fn activity_scaling() {
        let mut qcnf = qcnf_formula![
            e 1 2;
            1 2;
        ];
        let v1 = Var::from_dimacs(1);
        let v2 = Var::from_dimacs(2);
        qcnf.set_activity(v1, 1.0);
        qcnf.bump_activity(v2, 3.0);
        for _ in 0..100 {
            qcnf.decay_activity(0.99);
        }
        assert!(qcnf.activity_factor() >= 1.0);
        assert!(qcnf.get_activity(v1) < 1.0);
        assert!(qcnf.get_activity(v2) > qcnf.get_activity(v1));
    }

    #[test]
    fn rescale_preserves_ranking() {
        let mut qcnf = qcnf_formula![
            e 1 2 3;
            1 2 3;
        ];
        let vars: Vec<Var> = (1..=3).map(Var::from_dimacs).collect();
        qcnf.set_activity(vars[0], 0.5);
        qcnf.set_activity(vars[1], 2.0);
        qcnf.set_activity(vars[2], 1.0);
        for _ in 0..10 {
            qcnf.decay_activity(0.99);
        }
        let before: Vec<f64> = vars.iter().map(|&v| qcnf.get_activity(v)).collect();
        qcnf.rescale_activity_values();
        assert!((qcnf.activity_factor() - 1.0).abs() < f64::EPSILON);
        let after: Vec<f64> = vars.iter().map(|&v| qcnf.get_activity(v)).collect();
        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-9);
        }
        assert!(after[1] > after[2] && after[2] > after[0]);
    }
}
