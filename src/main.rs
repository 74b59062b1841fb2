use clap::Parser;
use coherence_sim::config::Config;
use coherence_sim::run_simulation;
use env_logger::Env;
use std::process::ExitCode;

fn init_msg() {
    println!("cache coherence simulation");
}

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().filter_or("SIM_LOG", "warn"));

    let config = Config::parse();
    if let Err(err) = config.validate() {
        eprintln!("error: {}", err);
        return ExitCode::from(2);
    }
    if !config.quiet {
        init_msg();
        config.display();
        println!();
    }

    match run_simulation(&config) {
        Ok(results) => {
            for (variant, stats) in results {
                println!("--- {} ---", variant);
                println!("{}", stats);
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
