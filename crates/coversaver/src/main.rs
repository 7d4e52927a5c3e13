mod bootstrap;
mod cli;
mod paths;
mod run;
mod state;

use anyhow::Result;
use cli::{AuthService, Command};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let paths = AppPaths::discover()?;
    let mut state = bootstrap::bootstrap_filesystem(&paths)?;
    let config = bootstrap::load_config(cli.config.as_deref(), &paths)?;

    match cli.command {
        Command::Auth(auth) => match auth.service {
            AuthService::Spotify(args) => run::run_auth_spotify(args, &config, &paths, &mut state),
        },
        Command::Collect(args) => run::run_collect(args, &config, &paths, &mut state),
        Command::Bundle(args) => run::run_bundle(args, &config, &paths),
        Command::Layout(args) => run::run_layout(args, &config),
        Command::Where => run::run_where(&paths, &state),
    }
}
