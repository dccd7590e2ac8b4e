//! Identify command implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hookid::{HookInfo, IdentifyConfig, ImageScan, TargetKind};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::info;

pub struct IdentifyArgs {
    pub exe: PathBuf,
    pub editor: bool,
    pub json: bool,
    pub config: Option<PathBuf>,
    pub library_stem: Option<String>,
}

#[derive(Serialize)]
struct Report<'a> {
    scan: &'a ImageScan,
    hook: &'a HookInfo,
    library: String,
}

/// Run the identify command
pub fn run(args: IdentifyArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => IdentifyConfig::default(),
    };
    if let Some(stem) = args.library_stem {
        config.library_stem = stem;
    }
    let target = if args.editor {
        TargetKind::Editor
    } else {
        TargetKind::Runtime
    };

    let scan = hookid::scan(&args.exe, &config)
        .with_context(|| format!("Failed to identify {}", args.exe.display()))?;
    let hook = hookid::resolve_scan(&scan, target, &config)
        .with_context(|| format!("Unsupported {} build {}", target, scan.version))?;
    let library = hook.library_name(&config.library_stem);

    if args.json {
        let report = Report {
            scan: &scan,
            hook: &hook,
            library,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== {} ===", args.exe.display());
    println!("Version:      {} (0x{:016X})", scan.version, scan.version);
    println!("Type:         {}", scan.proc_type);
    println!(
        "Region lock:  {}",
        if scan.flags.region_locked {
            "yes".yellow().to_string()
        } else {
            "no".to_string()
        }
    );
    if let Some(path) = &scan.pdb_path {
        println!("PDB:          {}", path);
    }
    println!();
    println!("{} {} {}", "Supported".green().bold(), target, hook.label);
    println!("Hook call:    0x{:08X}", hook.hook_call_addr);
    println!("LoadLibrary:  0x{:08X}", hook.load_library_addr);
    println!("Library:      {}", library);

    Ok(())
}

fn load_config(path: &Path) -> Result<IdentifyConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    info!("Loaded config from {:?}", path);
    Ok(config)
}

fn parse_config(content: &str) -> Result<IdentifyConfig> {
    let config: IdentifyConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
