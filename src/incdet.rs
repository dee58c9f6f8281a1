//! Implementation of the incremental determinization algorithm.
//!
//! The engine extends a partial Skolem function by propagation through the
//! Skolem domain, detects first-order conflicts, learns clauses by
//! first-order resolution, and backtracks with activity-based variable
//! selection. Examples, CEGAR, and case splits assist the search.

use self::{
    casesplit::{Assumption, Casesplits, DepthPenalty},
    cegar::{Cegar, CegarRound},
    conflict::{second_largest_distinct_lvl, ConflictAnalysis},
    examples::{Examples, PartialAssignment, PartialAssignmentDomain},
    skolem::{Skolem, SkolemDomain, SkolemState},
    stats::Statistics,
};
use crate::{
    clause::db::ClauseId,
    literal::{Lit, Var},
    options::{Magic, Options},
    qcnf::QCNF,
    qdimacs::FromQdimacs,
    sat::{varisat::Varisat, ScopedSolver},
    QuantTy, SolverResult,
};
use derivative::Derivative;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

pub(crate) mod casesplit;
pub(crate) mod cegar;
pub(crate) mod conflict;
pub(crate) mod examples;
pub(crate) mod skolem;
pub(crate) mod stats;

#[cfg(test)]
mod test;

/// A decision level. The engine is the sole authority on advancing it; the
/// Skolem and Examples stacks follow in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub(crate) struct DecLvl(usize);

impl DecLvl {
    pub(crate) const ROOT: DecLvl = DecLvl(0);

    pub(crate) fn is_root(self) -> bool {
        self == Self::ROOT
    }

    pub(crate) fn successor(self) -> Self {
        Self(self.0 + 1)
    }

    pub(crate) fn predecessor(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub(crate) fn from_usize(lvl: usize) -> Self {
        Self(lvl)
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for DecLvl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineState {
    Ready,
    SkolemConflict,
    ExamplesConflict,
    CloseCase,
    Sat,
    Unsat,
    AbortExternal,
}

/// External decision controller: receives the number of remaining
/// conflicts before the next restart, returns a signed decision literal in
/// DIMACS convention, or 0 to abort the search.
pub type DecisionCallback = Box<dyn FnMut(u32) -> i32>;

#[derive(Derivative)]
#[derivative(Debug)]
pub struct IncDet {
    qcnf: QCNF,
    options: Options,
    magic: Magic,
    state: EngineState,
    skolem: Skolem,
    examples: Examples,
    conflict_analysis: ConflictAnalysis,
    casesplits: Casesplits,
    cegar: Cegar,
    /// present exactly while in a conflict state
    current_conflict: Option<Vec<Lit>>,
    /// learnt clauses never force backtracking below this level
    restart_base_decision_lvl: DecLvl,
    restarts: u32,
    restarts_since_last_major: u32,
    next_restart: u32,
    next_major_restart: u32,
    decisions_since_last_conflict: u32,
    skolem_success_recent_average: f64,
    conflicts_between_case_splits_countdown: u32,
    keeping_clauses_threshold: u32,
    refuting: Option<Vec<Lit>>,
    #[derivative(Debug = "ignore")]
    decision_callback: Option<DecisionCallback>,
    initialized: bool,
    stats: Statistics,
}

impl Default for IncDet {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl FromQdimacs for IncDet {
    fn set_num_variables(&mut self, variables: u32) {
        self.qcnf.set_var_count(variables.try_into().unwrap());
    }

    fn set_num_clauses(&mut self, clauses: u32) {
        self.qcnf.reserve_clauses(clauses);
    }

    fn quantify(&mut self, quant: QuantTy, vars: &[Var]) {
        self.qcnf.quantify(quant, vars);
    }

    fn add_clause(&mut self, lits: &[Lit]) {
        for &lit in lits {
            self.qcnf.add_lit(lit);
        }
        let _ = self.close_clause(true);
    }
}

impl IncDet {
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        let magic = Magic::new(options.easy_debugging);
        Self {
            qcnf: QCNF::default(),
            state: EngineState::Ready,
            skolem: Skolem::default(),
            examples: Examples::new(options.examples_max_num),
            conflict_analysis: ConflictAnalysis::default(),
            casesplits: Casesplits::new(
                DepthPenalty::Linear,
                magic.case_split_linear_depth_penalty_factor,
            ),
            cegar: Cegar::default(),
            current_conflict: None,
            restart_base_decision_lvl: DecLvl::ROOT,
            restarts: 0,
            restarts_since_last_major: 0,
            next_restart: magic.initial_restart,
            next_major_restart: magic.major_restart_frequency,
            decisions_since_last_conflict: 0,
            skolem_success_recent_average: magic.skolem_success_recent_average_initialization,
            conflicts_between_case_splits_countdown: 1,
            keeping_clauses_threshold: magic.keeping_clauses_threshold,
            refuting: None,
            decision_callback: None,
            initialized: false,
            options,
            magic,
            stats: Statistics::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_qcnf(qcnf: &QCNF, options: Options) -> Self {
        let mut solver = Self::with_options(options);
        solver.qcnf = qcnf.clone();
        solver
    }

    pub fn set_options(&mut self, options: Options) {
        self.magic = Magic::new(options.easy_debugging);
        self.examples = Examples::new(options.examples_max_num);
        self.options = options;
    }

    pub fn set_decision_callback(&mut self, callback: DecisionCallback) {
        self.decision_callback = Some(callback);
    }

    pub fn qcnf(&self) -> &QCNF {
        &self.qcnf
    }

    /// Streaming input: literals in DIMACS convention, 0 closes the clause.
    pub fn add_lit(&mut self, lit: i32) {
        if lit == 0 {
            let _ = self.close_clause(true);
        } else {
            self.qcnf.add_lit(Lit::from_dimacs(lit));
        }
    }

    pub fn new_variable(&mut self, is_universal: bool, var_id: i32) {
        self.qcnf.new_var(is_universal, Var::from_dimacs(var_id));
    }

    fn close_clause(&mut self, original: bool) -> Option<ClauseId> {
        let id = self.qcnf.close_clause(original)?;
        if self.initialized {
            self.notify_new_clause(id);
        }
        Some(id)
    }

    /// Propagates a new clause to all subsystems; may transition to UNSAT.
    fn notify_new_clause(&mut self, id: ClauseId) {
        self.stats.learning.clauses_added += 1;
        self.examples.new_clause(&self.qcnf, id);
        self.skolem.new_clause(&self.qcnf, id);
        if self.options.cegar || self.options.cegar_only {
            self.cegar.new_clause(&self.qcnf, id);
        }
        if self.skolem.is_conflicted() {
            if self.casesplits.has_active_assumptions() {
                // the innermost assumed literal cannot be part of any
                // strategy; abandon the case and continue outside of it
                debug!("case is infeasible after new clause");
                if let Some(assumption) = self.casesplits.drop_case() {
                    self.restart_base_decision_lvl = assumption.prev_restart_base;
                    self.backtrack_to(assumption.lvl.predecessor());
                }
            } else {
                self.refuting =
                    self.refuting_from_skolem_conflict().or_else(|| Some(Vec::new()));
                self.state = EngineState::Unsat;
            }
        }
    }

    fn init_subsystems(&mut self) {
        let count = self.qcnf.get_var_count();
        self.skolem.set_var_count(count);
        self.casesplits.set_var_count(count);
        if self.options.cegar || self.options.cegar_only {
            self.cegar.init(&self.qcnf);
        }
        for id in self.qcnf.clauses().ids().collect::<Vec<_>>() {
            self.skolem.new_clause(&self.qcnf, id);
        }
        self.initialized = true;
    }

    pub(crate) fn is_in_conflict(&self) -> bool {
        let res = matches!(
            self.state,
            EngineState::SkolemConflict | EngineState::ExamplesConflict
        );
        debug_assert_eq!(res, self.current_conflict.is_some());
        res
    }

    /// Propagates the Examples domain first, then the Skolem domain; either
    /// may put the engine into a conflict state and construct the current
    /// conflict by first-order analysis.
    fn propagate(&mut self) {
        debug_assert!(self.current_conflict.is_none());

        self.examples.propagate(&self.qcnf);
        if self.examples.is_conflicted() {
            debug_assert_eq!(self.state, EngineState::Ready);
            self.state = EngineState::ExamplesConflict;
            let pa = self
                .examples
                .conflicted_assignment()
                .expect("a conflicted entry exists");
            let var = pa.conflicted_var().expect("the entry records its conflict");
            let clause = pa.conflicted_clause().expect("the entry records its conflict");
            let domain = PartialAssignmentDomain { pa, qcnf: &self.qcnf };
            let cube = self.conflict_analysis.analyze(
                &self.qcnf,
                &domain,
                var,
                clause,
                pa.decision_lvl(),
            );
            self.current_conflict = Some(cube);
            return;
        }

        self.skolem.propagate(&self.qcnf);
        match self.skolem.state() {
            SkolemState::Ready => {}
            SkolemState::ConstantsConflict => {
                debug!("constants conflict, instance is unsatisfiable");
                self.refuting = Some(Vec::new());
                self.state = EngineState::Unsat;
            }
            SkolemState::SkolemConflict => {
                self.state = EngineState::SkolemConflict;
                let conflict = self.skolem.conflict().expect("the domain records its conflict");
                let (var, clause) = (conflict.var, conflict.clause);
                let domain = SkolemDomain { skolem: &self.skolem, qcnf: &self.qcnf };
                let cube = self.conflict_analysis.analyze(
                    &self.qcnf,
                    &domain,
                    var,
                    clause,
                    self.skolem.decision_lvl(),
                );
                self.current_conflict = Some(cube);
            }
        }
    }

    /// Initial propagation together with the assertion of the universal
    /// constraints (unary universal input clauses).
    fn initial_propagation(&mut self) {
        self.propagate();
        if self.state == EngineState::Ready {
            for lit in self.qcnf.universal_constraints().to_vec() {
                self.skolem.make_universal_assumption(&self.qcnf, lit);
                if self.options.cegar || self.options.cegar_only {
                    self.cegar.add_universal_constraint(lit);
                }
            }
            // constants derived from the constraints may extend propagation
            self.propagate();
        }
    }

    pub(crate) fn backtrack_to(&mut self, lvl: DecLvl) {
        debug_assert!(lvl <= self.skolem.decision_lvl());
        if self.state == EngineState::Unsat {
            warn!("backtracking from permanent conflict state");
        }
        trace!("backtracking to level {lvl}");
        self.state = EngineState::Ready;
        self.current_conflict = None;
        while self.skolem.decision_lvl() > lvl {
            debug_assert_eq!(self.skolem.push_count(), self.examples.push_count());
            debug_assert_eq!(self.skolem.push_count(), self.skolem.decision_lvl().as_usize());
            self.skolem.pop();
            self.examples.pop();
            self.stats.learning.lvls_backtracked += 1;
        }
        self.skolem.clear_conflict();
        self.examples.clear_conflict();
    }

    /// Whether the learnt clause involves a literal decided above the
    /// restart base.
    fn are_decisions_involved(&self, learnt: ClauseId) -> bool {
        let mut largest = self.restart_base_decision_lvl;
        for &lit in self.qcnf.clause(learnt).iter() {
            let dlvl = self.conflict_dlvl_of(lit.var());
            if dlvl > largest {
                largest = dlvl;
            }
        }
        largest > self.restart_base_decision_lvl
    }

    fn conflict_dlvl_of(&self, var: Var) -> DecLvl {
        match self.state {
            EngineState::SkolemConflict => self.skolem.get_decision_lvl(var),
            EngineState::ExamplesConflict => self
                .examples
                .conflicted_assignment()
                .map_or(DecLvl::ROOT, |pa| pa.get_decision_lvl(var)),
            _ => DecLvl::ROOT,
        }
    }

    /// The second-largest distinct decision level occurring in the learnt
    /// clause, clamped up to the restart base. For Skolem conflicts a
    /// constant takes its (possibly lower) constant level.
    fn determine_backtracking_lvl(&self, learnt: ClauseId) -> DecLvl {
        let lvls = self.qcnf.clause(learnt).iter().map(|l| {
            let mut dlvl = self.conflict_dlvl_of(l.var());
            if self.state == EngineState::SkolemConflict {
                if let Some(constant_dlvl) = self.skolem.get_dlvl_for_constant(l.var()) {
                    dlvl = dlvl.min(constant_dlvl);
                }
            }
            dlvl
        });
        second_largest_distinct_lvl(lvls).max(self.restart_base_decision_lvl)
    }

    /// Scans the nondeterministic existentials for the one with the highest
    /// activity. Ties keep the first-scanned variable.
    pub(crate) fn pick_most_active_nondeterministic_var(&self) -> Option<Var> {
        let mut decision_var = None;
        let mut decision_var_activity = -1.0;
        for (var, data) in self.qcnf.vars() {
            if data.is_universal() || self.skolem.is_deterministic(&self.qcnf, var) {
                continue;
            }
            let activity = self.qcnf.get_activity(var);
            if decision_var_activity < activity {
                decision_var_activity = activity;
                decision_var = Some(var);
            }
        }
        trace!("maximal activity is {decision_var_activity:?} for {decision_var:?}");
        decision_var
    }

    /// `Σ_{c ∈ clauses, |c| ≤ 10} 2^{-|c|} + 0.05·|clauses|`
    fn jeroslow_wang_log_weight(&self, clauses: &[ClauseId]) -> f64 {
        let mut weight = 0.0;
        for &id in clauses {
            let size = self.qcnf.clause(id).len();
            if size <= 10 {
                weight += (2f64).powi(-i32::try_from(size).unwrap());
            }
        }
        weight + clauses.len() as f64 * 0.05
    }

    fn decision_phase(&self, var: Var) -> bool {
        if self.restarts >= self.magic.num_restarts_before_jeroslow_wang {
            let pos = self.jeroslow_wang_log_weight(self.qcnf.occs(var.positive()));
            let neg = self.jeroslow_wang_log_weight(self.qcnf.occs(var.negative()));
            pos > neg
        } else {
            true
        }
    }

    /// Conflict clause minimization: a literal is dropped when propagating
    /// the negation of the remaining literals in a side propagator already
    /// refutes it.
    fn minimize_clause(&mut self, learnt: ClauseId) {
        let candidates: Vec<Lit> = self.qcnf.clause(learnt).lits().to_vec();
        for cand in candidates {
            let current: Vec<Lit> = self.qcnf.clause(learnt).lits().to_vec();
            if current.len() <= 1 {
                break;
            }
            if !current.contains(&cand) {
                continue;
            }
            let mut pa =
                PartialAssignment::with_ignored(self.qcnf.get_var_count(), learnt);
            for &l in current.iter().filter(|&&l| l != cand) {
                pa.assign(!l);
            }
            pa.propagate(&self.qcnf);
            if pa.is_conflicted() || pa.value(cand) == Some(false) {
                trace!("minimization removes {cand}");
                self.qcnf.remove_lit_from_clause(learnt, cand);
                self.stats.learning.literals_minimized_away += 1;
            }
        }
    }

    fn refuting_from_skolem_conflict(&self) -> Option<Vec<Lit>> {
        let conflict = self.skolem.conflict()?;
        let mut lits: Vec<Lit> = conflict
            .assignment
            .iter()
            .filter(|l| self.qcnf.is_universal(l.var()))
            .copied()
            .collect();
        lits.sort_unstable_by_key(|l| l.var());
        Some(lits)
    }

    fn refuting_from_cube(&self, cube: &[Lit]) -> Vec<Lit> {
        let mut lits: Vec<Lit> = cube
            .iter()
            .filter(|l| self.qcnf.is_universal(l.var()))
            .copied()
            .collect();
        lits.sort_unstable_by_key(|l| l.var());
        lits
    }

    /// On UNSAT: the value of every original universal variable in the
    /// refutation, as far as it is determined.
    #[must_use]
    pub fn refuting_assignment(&self) -> Option<&[Lit]> {
        self.refuting.as_deref()
    }

    /// CEGAR rounds after a Skolem conflict in which decisions were
    /// involved. May conclude UNSAT.
    fn cegar_rounds_for_conflict(&mut self) {
        let Some(mut universal_assignment) = self.refuting_from_skolem_conflict() else {
            return;
        };
        for _ in 0..self.magic.max_cegar_iterations_per_learnt_clause {
            match self.cegar.round(&self.qcnf, &mut self.skolem, &universal_assignment) {
                CegarRound::Refuted(cube) => {
                    self.refuting = Some(self.refuting_from_cube(&cube));
                    self.current_conflict = None;
                    self.state = EngineState::Unsat;
                    return;
                }
                CegarRound::Blocked => {
                    if self.cegar.recent_average_cube_size()
                        > self.magic.cegar_effectiveness_threshold
                    {
                        break;
                    }
                    // another SAT call; the adapter may already be exhausted
                    match self.skolem.adapter_universal_model(&self.qcnf) {
                        Some(next) => universal_assignment = next,
                        None => break,
                    }
                }
            }
        }
    }

    /// Tries to assume a single interface literal. Returns whether the
    /// case-split driver made progress.
    fn try_case_split(&mut self) -> bool {
        if !self.options.casesplits
            || self.restarts < self.magic.num_restarts_before_case_splits
            || self.conflicts_between_case_splits_countdown > 0
        {
            return false;
        }
        let Some(lit) = self.casesplits.pick_notorious_lit(
            &self.qcnf,
            &self.skolem,
            self.magic.notoriousity_threshold_factor,
        ) else {
            return false;
        };
        let prev_restart_base = self.restart_base_decision_lvl;
        self.skolem.push();
        self.examples.push();
        self.skolem.increase_decision_lvl();
        self.skolem.assume_case_lit(lit);
        let lvl = self.skolem.decision_lvl();
        self.casesplits.begin_case(Assumption { lit, lvl, prev_restart_base });
        self.restart_base_decision_lvl = lvl;
        self.conflicts_between_case_splits_countdown = 1;
        true
    }

    /// Closes the current case: with no case-split assumption active, the
    /// whole universal space is handled and the formula is satisfiable;
    /// otherwise the assumption cube is recorded, blocked in the adapter,
    /// and the search steps out of the assumption.
    fn close_case(&mut self) {
        debug_assert_eq!(self.state, EngineState::CloseCase);
        if !self.casesplits.has_active_assumptions() {
            if !self.skolem.universals_assumptions().is_empty() {
                debug!("concluding under universal constraints");
            }
            self.state = EngineState::Sat;
            return;
        }
        let assumption = self.casesplits.close_case().expect("an assumption is active");
        self.stats.search.cases_closed += 1;
        info!("{} cases closed so far", self.casesplits.closed_cases().len());
        let cube = self
            .casesplits
            .last_closed_cube()
            .expect("the case was just recorded")
            .to_vec();
        self.restart_base_decision_lvl = assumption.prev_restart_base;
        self.backtrack_to(assumption.lvl.predecessor());
        // exclude the handled part of the search space
        self.skolem.block_cube(&cube);
    }

    fn validate_invariants(&self) {
        debug_assert!(self.qcnf.activity_factor() >= 1.0);
        debug_assert!(self.qcnf.activity_factor().is_finite());
        if self.state == EngineState::Ready {
            debug_assert_eq!(self.skolem.push_count(), self.examples.push_count());
            debug_assert_eq!(
                self.skolem.push_count(),
                self.skolem.decision_lvl().as_usize()
            );
            debug_assert!(self.current_conflict.is_none());
        }
    }

    /// The inner loop: runs until the given number of conflicts is
    /// consumed (then a restart fires), or the search concludes.
    fn run(&mut self, mut remaining_conflicts: u32) {
        while remaining_conflicts > 0 {
            trace!("entering main loop at dlvl {}", self.skolem.decision_lvl());
            debug_assert!(matches!(
                self.state,
                EngineState::Ready | EngineState::SkolemConflict | EngineState::ExamplesConflict
            ));
            debug_assert!(self.skolem.decision_lvl() >= self.restart_base_decision_lvl);

            self.propagate();
            if self.state == EngineState::Unsat {
                return;
            }

            if self.is_in_conflict() {
                let conflict =
                    self.current_conflict.take().expect("conflict state implies a conflict");
                let conflict_var = match self.state {
                    EngineState::SkolemConflict => {
                        self.skolem.conflict().map(|c| c.var)
                    }
                    _ => self
                        .examples
                        .conflicted_assignment()
                        .and_then(PartialAssignment::conflicted_var),
                };

                for &lit in &conflict {
                    self.qcnf.add_lit(!lit);
                }
                let Some(learnt) = self.qcnf.close_clause(false) else {
                    // the learnt clause is empty after universal reduction
                    if self.skolem.adapter_is_satisfiable() {
                        // unblocked universal assignments remain
                        self.refuting = Some(self.refuting_from_cube(&conflict));
                        self.state = EngineState::Unsat;
                    } else {
                        self.state = EngineState::CloseCase;
                    }
                    return;
                };
                debug!(
                    "learnt clause {}: {}",
                    learnt,
                    self.qcnf.clause(learnt)
                );

                if self.options.minimize_conflicts {
                    self.minimize_clause(learnt);
                }

                remaining_conflicts -= 1;
                self.stats.learning.conflicts += 1;
                if self.conflicts_between_case_splits_countdown > 0 {
                    self.conflicts_between_case_splits_countdown -= 1;
                }

                let len = self.qcnf.clause(learnt).len() as u32;
                self.stats.learning.literals_learnt += len;
                let rating = 1.0
                    / (f64::from(len) * f64::from(self.decisions_since_last_conflict) + 1.0);
                self.skolem_success_recent_average = self.skolem_success_recent_average
                    * self.magic.skolem_success_horizon
                    + rating * (1.0 - self.magic.skolem_success_horizon);
                self.decisions_since_last_conflict = 0;

                if let Some(var) = conflict_var {
                    self.qcnf.bump_activity(var, self.magic.conflict_var_weight);
                }
                for lit in self.qcnf.clause(learnt).lits().to_vec() {
                    self.qcnf.bump_activity(lit.var(), self.magic.conflict_clause_weight);
                    self.casesplits.bump_interface_activity(lit.var(), 1.0);
                }

                let decisions_involved = self.are_decisions_involved(learnt);
                if decisions_involved && self.state == EngineState::SkolemConflict {
                    let _ = self.examples.add_assignment_from_skolem(&self.qcnf, &self.skolem);
                    debug!("examples cache holds {} entries", self.examples.len());
                    if self.options.cegar {
                        self.cegar_rounds_for_conflict();
                        if self.state == EngineState::Unsat {
                            return;
                        }
                    }
                }

                let backtracking_lvl = self.determine_backtracking_lvl(learnt);
                debug!(
                    "learnt clause has length {len}, backtracking to lvl {backtracking_lvl}"
                );
                let examples_conflict = self.state == EngineState::ExamplesConflict;
                self.backtrack_to(backtracking_lvl);

                self.notify_new_clause(learnt);
                if !decisions_involved
                    && examples_conflict
                    && self.state != EngineState::Unsat
                {
                    // a root-level example conflict that did not close the
                    // search; drop the entry so it cannot repeat verbatim
                    if !self.options.functional_synthesis {
                        warn!("example conflict without decisions did not conclude");
                    }
                    self.examples.drop_conflicted();
                    self.examples.clear_conflict();
                }

                self.qcnf.decay_activity(self.magic.decay_rate);
                self.validate_invariants();

                if self.state == EngineState::Unsat {
                    return;
                }
            } else {
                // no conflict; case splits and decisions make progress now
                debug_assert_eq!(self.state, EngineState::Ready);

                if self.skolem.can_propagate() {
                    continue;
                }

                if self.try_case_split() {
                    continue;
                }

                let Some(mut decision_var) = self.pick_most_active_nondeterministic_var()
                else {
                    // all variables carry Skolem functions
                    self.state = EngineState::CloseCase;
                    return;
                };

                let mut phase = true;
                if self.options.reinforcement_learning {
                    if let Some(callback) = self.decision_callback.as_mut() {
                        let d = callback(remaining_conflicts);
                        if d == 0 {
                            self.state = EngineState::AbortExternal;
                            return;
                        }
                        let lit = Lit::from_dimacs(d);
                        if self.qcnf.is_universal(lit.var())
                            || self.skolem.is_deterministic(&self.qcnf, lit.var())
                        {
                            warn!("external controller chose an illegal decision {lit}");
                            debug_assert!(false, "illegal external decision");
                        } else {
                            decision_var = lit.var();
                            phase = lit.is_positive();
                        }
                    }
                } else {
                    phase = self.decision_phase(decision_var);
                }

                self.qcnf
                    .scale_activity(decision_var, self.magic.decision_var_activity_modifier);

                // pushing before the actual decision keeps the stacks clean
                self.skolem.push();
                self.examples.push();
                self.skolem.increase_decision_lvl();

                self.stats.search.decisions += 1;
                self.decisions_since_last_conflict += 1;

                let lit = decision_var.lit(phase);
                debug!("decision {lit} at lvl {}", self.skolem.decision_lvl());
                self.examples
                    .decision_consistent_with_skolem(&self.qcnf, &self.skolem, lit);
                if self.examples.is_conflicted() {
                    debug!("examples domain is conflicted by the decision");
                } else {
                    self.skolem.decision(&self.qcnf, lit);
                }
            }
        }
        // results in a restart
        debug_assert!(matches!(
            self.state,
            EngineState::Ready | EngineState::SkolemConflict | EngineState::ExamplesConflict
        ));
    }

    fn restart_heuristics(&mut self) {
        self.restarts_since_last_major += 1;
        self.next_restart = (f64::from(self.next_restart) * self.magic.restart_factor) as u32;
        trace!(
            "next restart in {} conflicts, skolem success recent average {}",
            self.next_restart,
            self.skolem_success_recent_average
        );
        self.qcnf.rescale_activity_values();

        if self.next_major_restart == self.restarts_since_last_major {
            self.stats.search.major_restarts += 1;
            self.restarts_since_last_major = 0;
            self.next_restart = self.magic.initial_restart;
            self.keeping_clauses_threshold += 1;
            info!(
                "major restart no {}, resetting all activity values, keeping clauses up to length {}",
                self.stats.search.major_restarts, self.keeping_clauses_threshold
            );
            for var in self.qcnf.vars().map(|(var, _)| var).collect::<Vec<_>>() {
                self.qcnf.set_activity(var, 0.0);
            }
            debug_assert!((self.qcnf.activity_factor() - 1.0).abs() < f64::EPSILON);
            self.next_major_restart =
                (f64::from(self.next_major_restart) * self.magic.restart_factor) as u32;
        }

        if self.restarts % self.magic.replenish_frequency
            == self.magic.replenish_frequency - 1
        {
            info!("stepping out of case splits");
            self.backtrack_casesplits();
        }
    }

    fn backtrack_casesplits(&mut self) {
        if let Some(outermost) = self.casesplits.abandon_cases() {
            self.restart_base_decision_lvl = outermost.prev_restart_base;
            self.backtrack_to(outermost.lvl.predecessor());
        }
    }

    /// Number of connected components of the existential variables linked
    /// by shared clauses. Informational.
    fn partition_analysis(&self) {
        let count = self.qcnf.get_var_count();
        let mut parent: Vec<usize> = (0..count).collect();
        fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for (_, clause) in self.qcnf.clauses().iter() {
            let mut existentials = clause
                .iter()
                .filter(|l| self.qcnf.is_existential(l.var()))
                .map(|l| l.var().as_index());
            if let Some(first) = existentials.next() {
                for other in existentials {
                    let (a, b) = (find(&mut parent, first), find(&mut parent, other));
                    parent[a] = b;
                }
            }
        }
        let existentials: Vec<usize> =
            self.qcnf.existential_vars().map(Var::as_index).collect();
        let mut roots = std::collections::HashSet::new();
        for idx in existentials {
            let _ = roots.insert(find(&mut parent, idx));
        }
        info!("formula has {} partitions", roots.len());
    }

    fn check_propositional(&mut self) -> SolverResult {
        info!("using SAT solver to solve propositional problem");
        let mut checker: ScopedSolver<Varisat<'static>> = ScopedSolver::default();
        checker.set_var_count(self.qcnf.get_var_count());
        for id in self.qcnf.clauses().ids().collect::<Vec<_>>() {
            let lits: Vec<Lit> = self.qcnf.clause(id).lits().to_vec();
            checker.add_permanent_clause_lits(&lits);
        }
        match checker.solve() {
            Ok(true) => {
                self.state = EngineState::Sat;
                SolverResult::Satisfiable
            }
            Ok(false) => {
                // the empty refuting assignment
                self.refuting = Some(Vec::new());
                self.state = EngineState::Unsat;
                SolverResult::Unsatisfiable
            }
            Err(err) => {
                error!("SAT solver failed: {err}");
                SolverResult::Unknown
            }
        }
    }

    /// Pure CEGAR: propose universal assignments until the side solver is
    /// exhausted or one of them refutes the formula.
    fn solve_by_cegar(&mut self) -> SolverResult {
        loop {
            let Some(assignment) = self.cegar.next_universal_assignment(&self.qcnf) else {
                self.state = EngineState::Sat;
                return SolverResult::Satisfiable;
            };
            match self.cegar.round(&self.qcnf, &mut self.skolem, &assignment) {
                CegarRound::Blocked => {}
                CegarRound::Refuted(cube) => {
                    self.refuting = Some(self.refuting_from_cube(&cube));
                    self.state = EngineState::Unsat;
                    return SolverResult::Unsatisfiable;
                }
            }
        }
    }

    /// Solves the QBF using incremental determinization.
    pub fn solve(&mut self) -> SolverResult {
        let instant = Instant::now();
        let result = self.solve_inner();
        self.stats.search.solve_time = instant.elapsed();
        self.stats.search.restarts = self.restarts;
        self.stats.determinization = std::mem::take(&mut self.skolem.stats);
        info!("\n{:#?}", self.stats);
        if self.cegar.stats.rounds > 0 {
            info!("\n{:#?}", self.cegar.stats);
        }
        result
    }

    fn solve_inner(&mut self) -> SolverResult {
        if self.options.qbce {
            crate::preprocess::blocked_clause_elimination(&mut self.qcnf);
        }
        if !self.qcnf.is_2qbf() {
            if self.qcnf.is_propositional() {
                if !self.options.sat_by_qbf {
                    return self.check_propositional();
                }
            } else {
                error!("only 2QBF is currently supported");
                return SolverResult::Unknown;
            }
        }
        if self.qcnf.is_conflicted() {
            self.refuting = Some(Vec::new());
            self.state = EngineState::Unsat;
            return SolverResult::Unsatisfiable;
        }

        self.init_subsystems();
        self.initial_propagation();
        if self.state == EngineState::Unsat || self.is_in_conflict() {
            if self.refuting.is_none() {
                self.refuting = self
                    .current_conflict
                    .as_ref()
                    .map(|cube| self.refuting_from_cube(cube))
                    .or_else(|| self.refuting_from_skolem_conflict())
                    .or_else(|| Some(Vec::new()));
            }
            self.current_conflict = None;
            self.state = EngineState::Unsat;
            return SolverResult::Unsatisfiable;
        }

        if self.options.miniscoping {
            self.partition_analysis();
        }
        self.casesplits.update_interface(&self.qcnf, &self.skolem);
        if self.options.cegar_only {
            return self.solve_by_cegar();
        }

        // this loop controls the restarts
        while self.state == EngineState::Ready {
            self.run(self.next_restart);
            debug_assert!(!self.is_in_conflict() || self.state == EngineState::Unsat);
            if self.state == EngineState::CloseCase {
                self.close_case();
            }
            if self.state == EngineState::Ready {
                self.backtrack_to(self.restart_base_decision_lvl);
                self.restarts += 1;
                debug!("restart {}", self.restarts);
                self.restart_heuristics();
            }
        }

        match self.state {
            EngineState::Sat => SolverResult::Satisfiable,
            EngineState::Unsat => SolverResult::Unsatisfiable,
            _ => SolverResult::Unknown,
        }
    }

    pub(crate) fn num_decisions(&self) -> u32 {
        self.stats.search.decisions
    }
}

/// Restart interval bookkeeping, exposed for the schedule tests.
#[cfg(test)]
impl IncDet {
    pub(crate) fn next_restart(&self) -> u32 {
        self.next_restart
    }

    pub(crate) fn force_restart_heuristics(&mut self) {
        self.restarts += 1;
        self.restart_heuristics();
    }

    pub(crate) fn activity_snapshot(&self) -> Vec<(Var, f64)> {
        self.qcnf
            .vars()
            .map(|(var, _)| (var, self.qcnf.get_activity(var)))
            .collect()
    }
}
