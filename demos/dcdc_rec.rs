//! Recurrence synthesis for the boost DC-DC converter: visit two target
//! regions infinitely often.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use symbolic_control::alphabet::SymbolicAlphabet;
use symbolic_control::controller::{read_points, safe_mask, Controller};
use symbolic_control::game::GameSolver;
use symbolic_control::models::Dcdc;
use symbolic_control::relation::RelationEngine;
use symbolic_control::symbolic::BddEngine;
use symbolic_control::transition::GrowthBoundTransitionBuilder;

/// Bounding boxes `[lo, hi]` of the two targets.
const TARGETS: [([f64; 2], [f64; 2]); 2] = [([1.3, 5.7], [1.6, 5.9]), ([0.8, 5.0], [1.1, 5.2])];

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Refine the state grid by this factor.
    #[arg(value_name = "INT", default_value = "1")]
    divider: u32,

    /// Files with unsafe points, one per target.
    #[clap(long, value_name = "FILE", num_args = 2)]
    unsafe_points: Option<Vec<PathBuf>>,

    /// Directory to write one controller per target into.
    #[clap(long, value_name = "DIR")]
    output: Option<PathBuf>,

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
    let pre = SymbolicAlphabet::new(&mut engine, Dcdc::state_grid(args.divider)?);
    let input = SymbolicAlphabet::new(&mut engine, Dcdc::input_grid()?);
    let post = pre.duplicate(&mut engine);

    let time = std::time::Instant::now();
    let transitions = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Dcdc).build(&engine)?;
    println!(
        "Computed {} transitions in {:.3} s",
        transitions.transitions(),
        time.elapsed().as_secs_f64()
    );

    let mut targets = Vec::new();
    for (i, (lo, hi)) in TARGETS.iter().enumerate() {
        let mut target = pre.indices_satisfying(&engine, pre.inner_box(lo, hi));
        if let Some(paths) = &args.unsafe_points {
            let points = read_points(BufReader::new(File::open(&paths[i])?))?;
            println!("Read {} unsafe points for target {}", points.len(), i + 1);
            target = engine.intersect(&target, &safe_mask(&engine, &pre, &points)?);
        }
        println!("Target {}: {:?} .. {:?}, {} states", i + 1, lo, hi, pre.size_of(&engine, &target));
        targets.push(target);
    }

    let time = std::time::Instant::now();
    let res = GameSolver::new(&engine, &transitions).recurrence(&targets);
    println!(
        "Synthesis took {} outer iterations and {:.3} s",
        res.iterations,
        time.elapsed().as_secs_f64()
    );
    if engine.is_empty(&res.winning) {
        color_eyre::eyre::bail!("No state can visit both targets infinitely often");
    }
    println!("Winning domain size: {}", pre.size_of(&engine, &res.winning));

    for (i, relation) in res.controllers.into_iter().enumerate() {
        let controller = Controller::new(pre.clone(), input.clone(), relation);
        println!(
            "Controller {} has {} nodes over {} states",
            i + 1,
            engine.node_count(controller.relation()),
            controller.domain_size(&engine)
        );
        if let Some(dir) = &args.output {
            controller.save(&engine, dir.join(format!("dcdc_rec_{}.txt", i + 1)))?;
        }
    }

    println!("Manager holds {} nodes", engine.bdd().num_nodes());
    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
