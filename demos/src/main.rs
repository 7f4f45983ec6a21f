//! DroQ / SAC Examples
//!
//! Runs the training step on synthetic replay batches with real networks.
//!
//! ```bash
//! # DroQ: 20 critic steps per call, one actor step on the ensemble mean
//! cargo run --release -- droq
//!
//! # SAC: one critic step and one actor step per call on the ensemble min
//! cargo run --release -- sac
//! ```

mod droq_synthetic;

use droq_rl::SACConfig;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "droq" => droq_synthetic::run("DroQ", SACConfig::droq()),
            "sac" => droq_synthetic::run("SAC", SACConfig::sac()),
            _ => {
                println!("Unknown algorithm: {}", args[1]);
                println!();
                print_usage();
            }
        }
    } else {
        print_usage();
    }
}

fn print_usage() {
    println!("Usage: demos <algorithm>");
    println!();
    println!("Algorithms:");
    println!("  droq   DroQ preset (dropout + layer-norm critic ensemble)");
    println!("  sac    Plain SAC preset");
}
