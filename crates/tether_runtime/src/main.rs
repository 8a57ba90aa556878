//! Tether Runner
//!
//! Runs a script file inside the bridge runtime

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tether_script::{Interop, ScriptEngine};
use tether_services::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Run a script with host interop", long_about = None)]
struct Args {
    /// Settings file (JSON)
    #[arg(short, long, value_name = "FILE", env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Extra module search directory (repeatable)
    #[arg(short = 'm', long = "module-path", value_name = "DIR")]
    module_paths: Vec<PathBuf>,

    /// Script to run
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Arguments exposed to the script as `scriptArgs`
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env();
    settings.script.module_paths.extend(args.module_paths.iter().cloned());
    Ok(settings)
}

fn init_logging(settings: &Settings) {
    // `TETHER_LOG` has already been folded into the settings.
    let filter = EnvFilter::new(&settings.logging.filter);
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;
    init_logging(&settings);

    tracing::info!("Tether v{}", tether_host::VERSION);

    let engine = ScriptEngine::new(settings.script);
    let bridge = engine.start()?;
    if let Some(dir) = args.script.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        bridge.add_module_path(dir);
    }

    let interop = Interop::new(bridge);
    interop
        .run_file(&args.script, &args.args)
        .with_context(|| format!("running {}", args.script.display()))?;
    drop(interop);

    engine.stop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_and_trailing_args() {
        let args = Args::parse_from([
            "tether",
            "-m",
            "lib",
            "--module-path",
            "vendor",
            "main.js",
            "level1",
            "--fast",
        ]);
        assert_eq!(args.script, PathBuf::from("main.js"));
        assert_eq!(args.args, vec!["level1", "--fast"]);
        assert_eq!(args.module_paths, vec![PathBuf::from("lib"), PathBuf::from("vendor")]);
    }

    #[test]
    fn command_line_paths_extend_settings() {
        let args = Args::parse_from(["tether", "-m", "extra", "main.js"]);
        let settings = load_settings(&args).unwrap();
        assert!(settings.script.module_paths.contains(&PathBuf::from("extra")));
    }
}
