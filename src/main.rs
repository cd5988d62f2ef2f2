use clap::Parser;
use markdup_mc::{
    cmdline::cli::{run, Cli},
    utils::logging::init_global_logger,
};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_global_logger(cli.VERBOSITY) {
        eprintln!("Failed to initialize logger: {:?}", err);
    }

    if let Err(err) = run(&cli) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}
