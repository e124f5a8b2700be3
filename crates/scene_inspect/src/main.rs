use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use scene_inspect::{parse_link_slot, run, InspectOptions, DEFS_DIR_ENV_VAR};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(options) = parse_args(&args, env::var(DEFS_DIR_ENV_VAR).ok())? else {
        print_usage();
        return Ok(());
    };
    run(&options, &mut io::stdout())
}

fn parse_args(args: &[String], env_defs_dir: Option<String>) -> Result<Option<InspectOptions>, String> {
    if args.is_empty() {
        return Err(usage_text());
    }

    let mut options = InspectOptions::default();
    let mut scene_path = None;
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => return Ok(None),
            "--defs" => {
                options.defs_dir = Some(PathBuf::from(flag_value(args, index, "--defs")?));
                index += 2;
            }
            "--scene" => {
                scene_path = Some(PathBuf::from(flag_value(args, index, "--scene")?));
                index += 2;
            }
            "--out" => {
                options.out_path = Some(PathBuf::from(flag_value(args, index, "--out")?));
                index += 2;
            }
            "--link" => {
                let slot = parse_link_slot(flag_value(args, index, "--link")?)?;
                options.link_slots.push(slot);
                index += 2;
            }
            "--placeholder-missing" => {
                options.placeholder_missing = true;
                index += 1;
            }
            other => return Err(format!("unknown argument '{other}'\n\n{}", usage_text())),
        }
    }

    options.scene_path = scene_path.ok_or_else(|| "missing required --scene <file>".to_string())?;
    if options.defs_dir.is_none() {
        options.defs_dir = env_defs_dir
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
    }
    Ok(Some(options))
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "scene_inspect - build a prefab scene and print its hierarchy",
        "",
        "Usage:",
        "  scene_inspect --scene <file> [--defs <dir>] [--placeholder-missing] [--link <Component.field>]... [--out <file>]",
        "",
        "Options:",
        "  --defs <dir>             prefab def XML directory (default: $PREFAB_SCENE_DEFS_DIR)",
        "  --scene <file>           scene JSON document to load",
        "  --placeholder-missing    keep instances whose prefab is missing",
        "  --link <Component.field> resolve this field as a reference to another node id",
        "  --out <file>             write the normalized scene document",
    ]
    .join("\n")
}
