//! Root CLI structure for mmd-rs

use clap::{Parser, Subcommand};

use crate::commands::{projectile, trace, vmd};

#[derive(Parser)]
#[command(name = "mmd-rs")]
#[command(about = "Motion-editing tools for MikuMikuDance models", long_about = None)]
#[command(version)]
#[command(author)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aim a model's face chain at the camera of a camera motion
    TraceCamera(trace::TraceCameraArgs),

    /// Aim a model's face chain at a bone of another model
    TraceModel(trace::TraceModelArgs),

    /// Aim a turret chain ballistically and export bullet motions
    Projectile(projectile::ProjectileArgs),

    /// Run a batch of projectile tasks from a JSON list
    Turret(projectile::TurretArgs),

    /// VMD motion file operations
    Vmd {
        #[command(subcommand)]
        command: vmd::VmdCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
