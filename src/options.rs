//! Engine configuration and magic constants.

/// Feature switches of the engine. Populated from the command line by the
/// binary; defaults give the plain incremental determinization search.
#[derive(Debug, Clone)]
pub struct Options {
    /// run conflict clause minimization
    pub minimize_conflicts: bool,
    /// enable CEGAR rounds within the main loop
    pub cegar: bool,
    /// skip the CDCL-style search, drive purely by CEGAR
    pub cegar_only: bool,
    /// enable the case-split driver
    pub casesplits: bool,
    /// partition-based decomposition analysis (informational)
    pub miniscoping: bool,
    /// delegate decisions to an external controller
    pub reinforcement_learning: bool,
    /// adjust magic thresholds for deterministic behavior
    pub easy_debugging: bool,
    /// relax the assumption that unsatisfiability is unreachable
    pub functional_synthesis: bool,
    /// route propositional inputs through the QBF engine
    pub sat_by_qbf: bool,
    /// blocked clause elimination before the engine starts
    pub qbce: bool,
    /// print QDIMACS-compliant status lines
    pub qdimacs_compliant: bool,
    /// bound of the universal counterexample cache
    pub examples_max_num: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            minimize_conflicts: false,
            cegar: false,
            cegar_only: false,
            casesplits: false,
            miniscoping: false,
            reinforcement_learning: false,
            easy_debugging: false,
            functional_synthesis: false,
            sat_by_qbf: false,
            qbce: false,
            qdimacs_compliant: false,
            examples_max_num: 8,
        }
    }
}

/// Tuning constants of the search. Ranges in comments give the sensible
/// intervals the defaults were picked from.
#[derive(Debug, Clone)]
pub struct Magic {
    pub initial_restart: u32,                  // [1..100], interacts with restart_factor
    pub restart_factor: f64,                   // [1.01..2]
    pub conflict_var_weight: f64,              // [0..5]
    pub conflict_clause_weight: f64,           // [0..3]
    pub decision_var_activity_modifier: f64,   // [-3.0..2.0]
    pub decay_rate: f64,
    pub major_restart_frequency: u32,
    pub replenish_frequency: u32,
    pub num_restarts_before_jeroslow_wang: u32,
    pub num_restarts_before_case_splits: u32,
    pub keeping_clauses_threshold: u32,
    pub skolem_success_horizon: f64,           // in (0, 1)
    pub skolem_success_recent_average_initialization: f64,
    pub notoriousity_threshold_factor: f64,    // > 0
    pub case_split_linear_depth_penalty_factor: f64,
    pub max_cegar_iterations_per_learnt_clause: u32,
    pub cegar_effectiveness_threshold: f64,
}

impl Magic {
    #[must_use]
    pub fn new(easy_debugging: bool) -> Self {
        Self {
            initial_restart: 6,
            restart_factor: 1.2,
            conflict_var_weight: 2.0,
            conflict_clause_weight: 1.0,
            decision_var_activity_modifier: 0.8,
            decay_rate: 0.99,
            major_restart_frequency: 15,
            replenish_frequency: 100,
            num_restarts_before_jeroslow_wang: if easy_debugging { 1000 } else { 3 },
            num_restarts_before_case_splits: if easy_debugging { 0 } else { 3 },
            keeping_clauses_threshold: 3,
            skolem_success_horizon: 0.9,
            skolem_success_recent_average_initialization: 1.0,
            notoriousity_threshold_factor: 5.0,
            case_split_linear_depth_penalty_factor: if easy_debugging { 1.0 } else { 5.0 },
            max_cegar_iterations_per_learnt_clause: 10,
            cegar_effectiveness_threshold: 10.0,
        }
    }
}

impl Default for Magic {
    fn default() -> Self {
        Self::new(false)
    }
}
