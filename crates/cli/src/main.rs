//! tidycache binary

use std::io;
use tidycache::cli::{self, EXIT_INTERNAL, exit_code_for_parse_error, render_error};
use tidycache::commands;
use tidycache::tracing::{TracingConfig, init_tracing};
use tidycache_core::{Settings, SystemCommandRunner};

fn main() {
    // NOTE: eprintln! here because tracing may be unusable during a panic
    #[allow(clippy::print_stderr)]
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("tidycache panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with CTCACHE_DEBUG=1 for more information.");
    }));

    std::process::exit(run());
}

fn run() -> i32 {
    let action = match cli::parse_args(std::env::args().skip(1)) {
        Ok(action) => action,
        Err(e) => {
            let _ = e.print();
            return exit_code_for_parse_error(&e);
        }
    };

    if let Err(e) = init_tracing(TracingConfig::from_env()) {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("{e:?}");
        }
        return EXIT_INTERNAL;
    }

    let settings = Settings::from_env();
    let stdout = io::stdout();
    let stderr = io::stderr();
    match commands::execute(
        action,
        &settings,
        &SystemCommandRunner,
        &mut stdout.lock(),
        &mut stderr.lock(),
    ) {
        Ok(code) => code,
        Err(e) => {
            render_error(&e);
            EXIT_INTERNAL
        }
    }
}
