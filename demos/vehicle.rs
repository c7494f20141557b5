//! Reach-avoid synthesis for the vehicle maze.

use std::path::PathBuf;

use clap::Parser;

use symbolic_control::alphabet::SymbolicAlphabet;
use symbolic_control::controller::Controller;
use symbolic_control::game::GameSolver;
use symbolic_control::models::Vehicle;
use symbolic_control::symbolic::BddEngine;
use symbolic_control::transition::GrowthBoundTransitionBuilder;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Refine the state grid by this factor.
    #[arg(value_name = "INT", default_value = "1")]
    divider: u32,

    /// Where to write the controller.
    #[clap(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Point to query the controller at, as `x,y,theta`.
    #[clap(long, value_name = "POINT", value_delimiter = ',', num_args = 3)]
    query: Option<Vec<f64>>,

    /// Computed table size (in bits, so the actual size is `2^size` entries).
    #[clap(long, value_name = "INT", default_value = "20")]
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
    let pre = SymbolicAlphabet::new(&mut engine, Vehicle::state_grid(args.divider)?);
    let input = SymbolicAlphabet::new(&mut engine, Vehicle::input_grid()?);
    let post = pre.duplicate(&mut engine);

    let inf = f64::INFINITY;
    let obstacles: Vec<_> = Vehicle::OBSTACLES
        .iter()
        .map(|h| pre.outer_box(&[h[0], h[2], -inf], &[h[1], h[3], inf]))
        .collect();
    let avoid = |x: &[f64]| obstacles.iter().any(|inside| inside(x));

    let time = std::time::Instant::now();
    let transitions = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Vehicle)
        .with_avoid(avoid)
        .build(&engine)?;
    println!(
        "Computed {} transitions in {:.3} s",
        transitions.transitions(),
        time.elapsed().as_secs_f64()
    );

    let target = pre.indices_satisfying(&engine, pre.inner_box(&[9.0, 0.0, -inf], &[9.5, 0.5, inf]));
    println!("Target states: {}", pre.size_of(&engine, &target));

    let time = std::time::Instant::now();
    let res = GameSolver::new(&engine, &transitions).reach(&target).nonempty(&engine)?;
    println!(
        "Synthesis took {} iterations and {:.3} s",
        res.iterations,
        time.elapsed().as_secs_f64()
    );

    let controller = Controller::new(pre.clone(), input.clone(), res.controller);
    println!("Winning domain size: {}", controller.domain_size(&engine));

    if let Some(point) = &args.query {
        let inputs = controller.restriction(&engine, point)?;
        println!("Admissible inputs at {:?}: {:?}", point, inputs);
    }
    if let Some(path) = &args.output {
        controller.save(&engine, path)?;
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
