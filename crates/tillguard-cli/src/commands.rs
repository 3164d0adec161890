//! CLI command implementations

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tillguard_core::{
    ComplexityValidator, ComplexityViolation, LockoutPolicy, PinGenerator, PinStrength,
    StrengthEvaluator,
};
use tillguard_service::ServiceConfig;

/// Tillguard - point-of-sale PIN policy tools
#[derive(Parser)]
#[command(name = "tillguard")]
#[command(about = "Check, grade and generate point-of-sale PINs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a PIN against the complexity rules (non-zero exit if rejected)
    Check {
        /// PIN to check
        pin: String,
    },

    /// Grade a PIN as WEAK, MEDIUM or STRONG
    Strength {
        /// PIN to grade
        pin: String,
    },

    /// Generate random PINs that are never WEAK
    Generate {
        /// How many PINs to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Show a lockout policy
    Policy {
        /// Built-in preset to show
        #[arg(long, value_enum, default_value_t = Preset::Default, conflicts_with = "config")]
        preset: Preset,

        /// Read the policy from a service config file instead
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a default service config file
    InitConfig {
        /// Where to write (defaults to $TILLGUARD_CONFIG or the user config dir)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Default,
    Strict,
    Lenient,
}

impl Preset {
    fn policy(self) -> LockoutPolicy {
        match self {
            Preset::Default => LockoutPolicy::default(),
            Preset::Strict => LockoutPolicy::strict(),
            Preset::Lenient => LockoutPolicy::lenient(),
        }
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    pin: &'a str,
    valid: bool,
    reason: Option<ComplexityViolation>,
    strength: PinStrength,
}

/// Run the CLI, writing results to `out`
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    match cli.command {
        Commands::Check { pin } => {
            let result = ComplexityValidator::validate(&pin);
            let report = CheckReport {
                pin: &pin,
                valid: result.is_ok(),
                reason: result.err(),
                strength: StrengthEvaluator::evaluate(&pin),
            };

            if cli.json {
                writeln!(out, "{}", serde_json::to_string(&report)?)?;
            } else if let Some(reason) = report.reason {
                writeln!(out, "✗ rejected: {}", reason)?;
            } else {
                writeln!(out, "✓ accepted ({})", report.strength)?;
            }

            if let Some(reason) = report.reason {
                bail!("PIN rejected: {}", reason);
            }
        }

        Commands::Strength { pin } => {
            let strength = StrengthEvaluator::evaluate(&pin);
            if cli.json {
                writeln!(out, "{}", serde_json::json!({ "strength": strength }))?;
            } else {
                writeln!(out, "{}", strength)?;
            }
        }

        Commands::Generate { count } => {
            let pins: Vec<String> = (0..count).map(|_| PinGenerator::generate()).collect();
            if cli.json {
                writeln!(out, "{}", serde_json::to_string(&pins)?)?;
            } else {
                for pin in pins {
                    writeln!(out, "{}", pin)?;
                }
            }
        }

        Commands::Policy { preset, config } => {
            let policy = match config {
                Some(path) => {
                    ServiceConfig::load(&path)
                        .with_context(|| format!("loading {}", path.display()))?
                        .lockout
                }
                None => preset.policy(),
            };

            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&policy)?)?;
            } else {
                writeln!(out, "Max attempts:     {}", policy.max_attempts)?;
                writeln!(
                    out,
                    "Lockout duration: {} minutes",
                    policy.lockout_duration.as_secs() / 60
                )?;
                writeln!(
                    out,
                    "Reset window:     {} hours",
                    policy.reset_window.as_secs() / 3600
                )?;
            }
        }

        Commands::InitConfig { path, force } => {
            let path = path.unwrap_or_else(ServiceConfig::default_path);
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ServiceConfig::default().save(&path)?;
            tracing::info!("Wrote default config to {:?}", path);
            writeln!(out, "Wrote {}", path.display())?;
        }
    }

    Ok(())
}
