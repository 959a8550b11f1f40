mod catalog;
mod cli;
mod db;
mod error;
mod fmt;
mod heartland;
mod importer;
mod logging;
mod models;
mod reconciler;
mod registry;
mod server;
mod settings;
mod staging;
mod sync;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Serve { bind } => cli::serve::run(bind),
        Commands::Import { kind, file } => cli::import::run(kind, &file),
        Commands::Status => cli::status::run(),
        Commands::SetStatus { po, status } => cli::set_status::run(&po, &status),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
