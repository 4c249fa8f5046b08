// main.rs — ufobsp-view entry point
//
//   ufobsp-view [+set <var> <value> ...] <basedir> <tiles> [positions]
//
// Loads the tiles found under <basedir>/maps, renders a few frames through
// the counting backend and prints per-frame statistics. RUST_LOG=debug shows
// the per-lump load counts.

use std::process::ExitCode;

use ufobsp_sys::viewer;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match viewer::run(std::env::args().skip(1)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
