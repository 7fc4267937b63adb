use clap::Parser;
use log::debug;
use snafu::ErrorCompat;

mod app;
mod args;

fn main() {
    let parsed = args::Args::parse();
    let level = if parsed.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("arguments: {:?}", parsed);

    if let Err(e) = app::run_command(&parsed) {
        eprintln!("projvote: an error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
