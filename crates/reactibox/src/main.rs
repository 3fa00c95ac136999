mod bindings;
mod cli;
mod debug;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Debug(args)) => debug::run(args),
        Some(Command::Where(args)) => run_where(args),
        None => run::run(cli.run),
    }
}

fn run_where(args: cli::SourceArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {} ({})",
        config_path.display(),
        if config_path.is_file() { "found" } else { "not found" }
    );
    match paths.user_shader() {
        Some(shader) => println!("  shader:      {}", shader.display()),
        None => println!(
            "  shader:      bundled (drop one at {} to override)",
            paths.user_shader_path().display()
        ),
    }
    Ok(())
}
