use clap::Parser;
use quern::config::Config;
use quern::server::{Server, StartupError};
use std::process;

fn main() {
    let config = Config::parse();
    if let Err(e) = run(&config) {
        eprintln!("quern: {e}");
        process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), StartupError> {
    let server = Server::bind(config)?;
    server.install_signal_handlers()?;
    println!(
        "serving {} on {} with {} workers",
        config.root.display(),
        server.local_addr(),
        server.worker_count()
    );
    server.run()
}
