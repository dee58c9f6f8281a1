use super::IncDet;
use crate::{literal::Var, options::Options, qdimacs::QdimacsParser, SolverResult};

fn solve(qcnf: &crate::qcnf::QCNF) -> SolverResult {
    IncDet::from_qcnf(qcnf, Options::default()).solve()
}

fn solve_with_all_features(qcnf: &crate::qcnf::QCNF) -> SolverResult {
    let options = Options {
        minimize_conflicts: true,
        cegar: true,
        casesplits: true,
        easy_debugging: true,
        ..Options::default()
    };
    IncDet::from_qcnf(qcnf, options).solve()
}

// propagation-only scenarios

#[test]
fn negation_function_found_by_propagation() {
    // only e = !u satisfies both clauses
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 -2;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    assert_eq!(solver.num_decisions(), 0);
}

#[test]
fn or_gate_with_inverter_by_propagation() {
    // 3 <=> 1 | 2 and 4 <=> !3, both fully forced
    let qcnf = qcnf_formula![
        a 1 2;
        e 3 4;
        -1 3; -2 3; 1 2 -3;
        3 4; -3 -4;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    assert_eq!(solver.num_decisions(), 0);
}

#[test]
fn unit_clause_cascades_through_propagation() {
    // the unit fixes 2, which turns the ternary clause into a forced
    // implication for 3
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        2;
        -2 3 1;
        -3 -1;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    assert_eq!(solver.num_decisions(), 0);
}

#[test]
fn forced_constant_collides_with_the_universal() {
    // 2 must be false by the unit clause but true for every universal value
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 2;
        -2;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    let refuting = solver.refuting_assignment().unwrap();
    assert_eq!(refuting.len(), 1);
    assert_eq!(refuting[0].var(), Var::from_dimacs(1));
}

#[test]
fn constants_cascade_into_a_root_conflict() {
    // the unit makes 3 constant, which forces 2, which the last clause
    // refutes under u = 1
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        3;
        -3 2;
        -2 -1;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    assert_eq!(
        solver.refuting_assignment(),
        Some(&[Var::from_dimacs(1).positive()][..])
    );
}

// scenarios that need decisions

#[test]
fn decision_supplies_the_default_phase() {
    // 2 and 3 only constrain each other; one decision breaks the cycle
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        2 3;
        -2 -3;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    assert_eq!(solver.num_decisions(), 1);
}

#[test]
fn decisions_uncover_unsat_behind_the_universal() {
    // under u = 1 the matrix is the complete conflict on 2 and 3; the
    // engine finds it through decisions, learning, and cached examples
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        -1 2 3;
        -1 2 -3;
        -1 -2 3;
        -1 -2 -3;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    let refuting = solver.refuting_assignment().unwrap();
    assert_eq!(refuting, &[Var::from_dimacs(1).positive()]);
}

#[test]
fn examples_cache_disabled_still_refutes() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        -1 2 3;
        -1 2 -3;
        -1 -2 3;
        -1 -2 -3;
    ];
    let options = Options { examples_max_num: 0, ..Options::default() };
    assert_eq!(IncDet::from_qcnf(&qcnf, options).solve(), SolverResult::Unsatisfiable);
}

#[test]
fn examples_cache_eviction_keeps_the_search_going() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        -1 2 3;
        -1 2 -3;
        -1 -2 3;
        -1 -2 -3;
    ];
    let options = Options { examples_max_num: 1, ..Options::default() };
    assert_eq!(IncDet::from_qcnf(&qcnf, options).solve(), SolverResult::Unsatisfiable);
}

// end-to-end scenarios

#[test]
fn empty_cnf_is_sat() {
    let qcnf = qcnf_formula![
        e 1;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
    assert_eq!(solver.num_decisions(), 0);
}

#[test]
fn forced_skolem_function() {
    // only e = true wins for both universal values
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn complete_conflict_is_unsat_with_refuting_universal() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        1 -2;
        -1 2;
        -1 -2;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    let refuting = solver.refuting_assignment().unwrap();
    // either universal value witnesses the refutation
    assert_eq!(refuting.len(), 1);
    assert_eq!(refuting[0].var(), Var::from_dimacs(1));
}

#[test]
fn propositional_fast_path_unsat() {
    let qcnf = qcnf_formula![
        e 1 2;
        1 2;
        -1 2;
        1 -2;
        -1 -2;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    assert_eq!(solver.refuting_assignment(), Some(&[][..]));
}

#[test]
fn propositional_fast_path_sat() {
    let qcnf = qcnf_formula![
        e 1 2;
        1 2;
        -1 2;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn three_quantifier_alternations_are_unknown() {
    let qcnf = qcnf_formula![
        e 1;
        a 2;
        e 3;
        1 2 3;
    ];
    assert_eq!(solve(&qcnf), SolverResult::Unknown);
}

#[test]
fn parsed_input_drives_the_engine() {
    let input = b"p cnf 2 2\na 1 0\ne 2 0\n1 2 0\n-1 2 0\n";
    let mut solver: IncDet = QdimacsParser::new(input).parse().unwrap();
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
}

#[test]
fn restart_schedule() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    let mut intervals = vec![solver.next_restart()];
    for _ in 0..9 {
        solver.force_restart_heuristics();
        intervals.push(solver.next_restart());
    }
    assert_eq!(intervals, vec![6, 7, 8, 9, 10, 12, 14, 16, 19, 22]);
}

#[test]
fn major_restart_resets_activities() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        1 2 3;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    solver.qcnf.set_activity(Var::from_dimacs(2), 1.5);
    solver.qcnf.bump_activity(Var::from_dimacs(3), 2.0);
    for _ in 0..3 {
        solver.qcnf.decay_activity(0.99);
    }

    for _ in 0..14 {
        solver.force_restart_heuristics();
        assert!(solver.activity_snapshot().iter().any(|&(_, a)| a > 0.0));
    }
    // the 15th restart is major
    solver.force_restart_heuristics();
    assert!(solver.activity_snapshot().iter().all(|&(_, a)| a == 0.0));
    assert!((solver.qcnf.activity_factor() - 1.0).abs() < f64::EPSILON);
    assert_eq!(solver.next_restart(), 6);
}

#[test]
fn jeroslow_wang_weight() {
    let qcnf = qcnf_formula![
        e 1 2 3;
        1 2;
        1 2 3;
        -1 2;
    ];
    let solver = IncDet::from_qcnf(&qcnf, Options::default());
    let pos = solver.qcnf.occs(Var::from_dimacs(1).positive());
    // 2^-2 + 2^-3 + 0.05 * 2
    let weight = solver.jeroslow_wang_log_weight(pos);
    assert!((weight - (0.25 + 0.125 + 0.1)).abs() < 1e-9);
}

#[test]
fn decision_ties_keep_first_variable() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        1 2 3;
        1 -2 -3;
    ];
    let mut solver = IncDet::from_qcnf(&qcnf, Options::default());
    solver.init_subsystems();
    // all activities are equal (zero)
    assert_eq!(
        solver.pick_most_active_nondeterministic_var(),
        Some(Var::from_dimacs(2))
    );
    solver.qcnf.bump_activity(Var::from_dimacs(3), 1.0);
    assert_eq!(
        solver.pick_most_active_nondeterministic_var(),
        Some(Var::from_dimacs(3))
    );
}

// the assisted configurations agree with the plain engine

#[test]
fn all_features_sat() {
    let qcnf = qcnf_formula![
        a 1 2;
        e 3 4;
        -1 3; -2 3; 1 2 -3;
        3 4; -3 -4;
    ];
    assert_eq!(solve_with_all_features(&qcnf), SolverResult::Satisfiable);
}

#[test]
fn all_features_unsat() {
    // the CEGAR round refutes the first conflicting universal assignment
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        -1 2 3;
        -1 2 -3;
        -1 -2 3;
        -1 -2 -3;
    ];
    assert_eq!(solve_with_all_features(&qcnf), SolverResult::Unsatisfiable);
}

#[test]
fn cegar_only_sat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        -1 -2;
    ];
    let options = Options { cegar_only: true, ..Options::default() };
    assert_eq!(IncDet::from_qcnf(&qcnf, options).solve(), SolverResult::Satisfiable);
}

#[test]
fn cegar_only_unsat() {
    let qcnf = qcnf_formula![
        a 1;
        e 2;
        1 2;
        1 -2;
    ];
    let options = Options { cegar_only: true, ..Options::default() };
    let mut solver = IncDet::from_qcnf(&qcnf, options);
    assert_eq!(solver.solve(), SolverResult::Unsatisfiable);
    let refuting = solver.refuting_assignment().unwrap();
    assert!(refuting.contains(&Var::from_dimacs(1).negative()));
}

#[test]
fn abort_through_external_decision() {
    // the formula requires a decision, which the controller refuses
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        1 2 3;
        1 -2 -3;
    ];
    let options = Options { reinforcement_learning: true, ..Options::default() };
    let mut solver = IncDet::from_qcnf(&qcnf, options);
    solver.set_decision_callback(Box::new(|_| 0));
    assert_eq!(solver.solve(), SolverResult::Unknown);
}

#[test]
fn external_decisions_drive_the_search() {
    let qcnf = qcnf_formula![
        a 1;
        e 2 3;
        1 2 3;
        1 -2 -3;
    ];
    let options = Options { reinforcement_learning: true, ..Options::default() };
    let mut solver = IncDet::from_qcnf(&qcnf, options);
    let mut script = vec![3, 2];
    solver.set_decision_callback(Box::new(move |_| script.pop().unwrap_or(0)));
    assert_eq!(solver.solve(), SolverResult::Satisfiable);
}
