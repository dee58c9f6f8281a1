use clap::Parser;
use miette::Result;
use skolemium::{
    cli::{self, Cli},
    incdet::IncDet,
    qdimacs::{self, ExtendedParseError, QdimacsParser},
    SolverResult,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<SolverResult> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let options = cli.to_options();
    let contents = cli::read_input(cli.input.as_deref())?;

    let mut solver: IncDet = match QdimacsParser::new(&contents).parse() {
        Ok(solver) => solver,
        Err(err) => {
            Err(ExtendedParseError { source_code: contents, related: vec![err] })?
        }
    };
    solver.set_options(options.clone());

    let result = solver.solve();
    if options.qdimacs_compliant {
        match result {
            SolverResult::Satisfiable => println!("s cnf 1"),
            SolverResult::Unsatisfiable => println!("s cnf 0"),
            SolverResult::Unknown => {}
        }
    } else {
        println!("result status: {result}");
    }
    if result == SolverResult::Unsatisfiable {
        if let Some(refuting) = solver.refuting_assignment() {
            println!("{}", qdimacs::v_line(refuting));
        }
    }

    Ok(result)
}
