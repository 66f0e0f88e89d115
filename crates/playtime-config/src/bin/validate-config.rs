//! Config validation CLI tool
//!
//! Validates a playtime job catalog and reports any errors.

use playtime_config::{ConfigError, JobRequirement};
use playtime_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a playtime job catalog.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match playtime_config::load_config(&config_path) {
        Ok(catalog) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", playtime_config::CURRENT_CONFIG_VERSION);
            println!("  Role timers: {}", if catalog.service.role_timers { "on" } else { "off" });
            println!("  Departments: {}", catalog.departments.len());
            println!("  Jobs: {}", catalog.jobs.len());

            if !catalog.jobs.is_empty() {
                println!();
                println!("Jobs:");
                for job in &catalog.jobs {
                    let tracker = job.tracker.as_ref().map(|t| t.as_str()).unwrap_or("-");
                    println!("  - {} [{}]: {}", job.id, tracker, job.name);
                    for requirement in job.requirements.iter().flatten() {
                        println!("      {}", describe(requirement));
                    }
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        playtime_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn describe(requirement: &JobRequirement) -> String {
    let bound = |inverted: bool| if inverted { "under" } else { "at least" };
    match requirement {
        JobRequirement::OverallPlaytime { time, inverted } => {
            format!("overall playtime {} {}", bound(*inverted), format_duration(*time))
        }
        JobRequirement::RoleTime { tracker, time, inverted } => {
            format!("{} time {} {}", tracker, bound(*inverted), format_duration(*time))
        }
        JobRequirement::DepartmentTime { department, time, inverted } => {
            format!("{} department time {} {}", department, bound(*inverted), format_duration(*time))
        }
        JobRequirement::Whitelist => "whitelisted players only".to_string(),
        JobRequirement::Species { species, inverted } => {
            let list = species.iter().cloned().collect::<Vec<_>>().join(", ");
            if *inverted {
                format!("species not in [{}]", list)
            } else {
                format!("species in [{}]", list)
            }
        }
    }
}
