use clap::Parser;
use shipment_loader::cli::{self, Args};
use std::process;

fn main() {
    let args = Args::parse();

    if let Err(error) = cli::run(args) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
