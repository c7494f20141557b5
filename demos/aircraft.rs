//! Reachability synthesis for a landing aircraft under measurement errors.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use symbolic_control::alphabet::SymbolicAlphabet;
use symbolic_control::controller::{read_points, safe_mask, Controller};
use symbolic_control::game::GameSolver;
use symbolic_control::models::Aircraft;
use symbolic_control::relation::RelationEngine;
use symbolic_control::symbolic::BddEngine;
use symbolic_control::transition::GrowthBoundTransitionBuilder;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Refine the state grid by this factor.
    #[arg(value_name = "INT", default_value = "1")]
    divider: u32,

    /// File with unsafe points, one per line.
    #[clap(long, value_name = "FILE")]
    unsafe_points: Option<PathBuf>,

    /// Where to write the controller.
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Computed table size (in bits, so the actual size is `2^size` entries).
    #[clap(long, value_name = "INT", default_value = "22")]
    size: usize,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let mut engine = BddEngine::new(args.size);
    let pre = SymbolicAlphabet::new(&mut engine, Aircraft::state_grid(args.divider)?);
    let input = SymbolicAlphabet::new(&mut engine, Aircraft::input_grid()?);
    let post = pre.duplicate(&mut engine);
    println!("state cells: {:?}", pre.grid().cells_per_axis());

    let z = Aircraft::MEASUREMENT_ERROR;
    let time = std::time::Instant::now();
    let transitions = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Aircraft)
        .with_measurement_error(z.to_vec())
        .build(&engine)?;
    println!(
        "Computed {} transitions in {:.3} s",
        transitions.transitions(),
        time.elapsed().as_secs_f64()
    );

    // Touchdown window, widened by the measurement error, with a bound on the sink rate.
    let eta = pre.eta().to_vec();
    let (lower, upper) = ([63.0, -3.0f64.to_radians(), 0.0], [75.0, 0.0, 2.5]);
    let target = pre.indices_satisfying(&engine, move |x: &[f64]| {
        let inside = (0..3).all(|i| {
            let r = eta[i] / 2.0 + z[i];
            lower[i] <= x[i] - r && x[i] + r <= upper[i]
        });
        let hi = x[0] + eta[0] / 2.0 + z[0];
        inside && -0.91 <= x[0] * x[1].sin() - eta[0] / 2.0 - z[0] - hi * (eta[1] / 2.0 - z[1])
    });
    println!("Target states: {}", pre.size_of(&engine, &target));

    let safe = match &args.unsafe_points {
        Some(path) => {
            let points = read_points(BufReader::new(File::open(path)?))?;
            println!("Read {} unsafe points", points.len());
            safe_mask(&engine, &pre, &points)?
        }
        None => engine.universe(&[pre.space()]),
    };

    let time = std::time::Instant::now();
    let res = GameSolver::new(&engine, &transitions)
        .with_safe_states(safe)
        .reach(&target)
        .nonempty(&engine)?;
    println!(
        "Synthesis took {} iterations and {:.3} s",
        res.iterations,
        time.elapsed().as_secs_f64()
    );

    let controller = Controller::new(pre.clone(), input.clone(), res.controller);
    println!("Winning domain size: {}", controller.domain_size(&engine));
    println!("Controller has {} nodes", engine.node_count(controller.relation()));

    if let Some(path) = &args.output {
        controller.save(&engine, path)?;
    }

    println!("Manager holds {} nodes", engine.bdd().num_nodes());
    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
