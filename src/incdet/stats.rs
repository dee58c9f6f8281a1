//! Search accounting, grouped by the engine's four ways of making
//! progress: the outer search, clause learning, determinization, and the
//! CEGAR refinement.

use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct Statistics {
    pub(crate) search: SearchStats,
    pub(crate) learning: LearningStats,
    pub(crate) determinization: DeterminizationStats,
}

/// The outer loop: decisions, restarts, and case handling.
#[derive(Debug, Default)]
pub(crate) struct SearchStats {
    pub(crate) decisions: u32,
    pub(crate) restarts: u32,
    pub(crate) major_restarts: u32,
    pub(crate) cases_closed: u32,
    pub(crate) solve_time: Duration,
}

/// Conflicts and what became of them.
#[derive(Debug, Default)]
pub(crate) struct LearningStats {
    pub(crate) conflicts: u32,
    pub(crate) clauses_added: u32,
    pub(crate) literals_learnt: u32,
    pub(crate) literals_minimized_away: u32,
    pub(crate) lvls_backtracked: u32,
}

/// Work done by the Skolem domain.
#[derive(Debug, Default)]
pub(crate) struct DeterminizationStats {
    pub(crate) propagations: u32,
    pub(crate) determinizations: u32,
    pub(crate) determinicity_checks: u32,
    pub(crate) conflict_checks: u32,
}

/// Work done by the CEGAR refinement.
#[derive(Debug, Default)]
pub(crate) struct RefinementStats {
    pub(crate) rounds: u32,
    pub(crate) blocked_cubes: u32,
    pub(crate) recent_average_cube_size: f64,
}
