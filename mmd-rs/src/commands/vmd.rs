//! VMD motion file command implementations

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use prettytable::{Table, row};

use mmd_vmd::Motion;

use super::trace::open_motion;

#[derive(Subcommand)]
pub enum VmdCommands {
    /// Display header and per-section frame counts
    Info {
        /// Path to the VMD file
        file: PathBuf,
    },

    /// Compare two motions keyed by (frame, name)
    Diff {
        /// Left-hand motion
        a: PathBuf,

        /// Right-hand motion
        b: PathBuf,

        /// Restrict bone and morph comparison to these names
        #[arg(long, num_args = 1..)]
        names: Vec<String>,

        /// Print only the summary counts
        #[arg(long)]
        short: bool,
    },

    /// Concatenate motions; the first file's model name wins
    Merge {
        /// Input motions, merged in order
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Output motion
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn execute(cmd: VmdCommands) -> Result<()> {
    match cmd {
        VmdCommands::Info { file } => handle_info(&file),
        VmdCommands::Diff { a, b, names, short } => handle_diff(&a, &b, &names, short),
        VmdCommands::Merge { input, output } => handle_merge(&input, &output),
    }
}

fn handle_info(path: &Path) -> Result<()> {
    let motion = open_motion(path)?;
    println!("Model: {}", motion.model_name);
    let kind = if motion.is_camera_motion() {
        "camera/lighting"
    } else {
        "model"
    };
    println!("Kind: {kind} motion");

    let bone_names: BTreeSet<&str> = motion.bones.iter().map(|f| f.name.as_str()).collect();
    let morph_names: BTreeSet<&str> = motion.morphs.iter().map(|f| f.name.as_str()).collect();

    let mut table = Table::new();
    table.add_row(row!["Section", "Frames", "Names"]);
    table.add_row(row!["bones", motion.bones.len(), bone_names.len()]);
    table.add_row(row!["morphs", motion.morphs.len(), morph_names.len()]);
    table.add_row(row!["cameras", motion.cameras.len(), ""]);
    table.add_row(row!["lights", motion.lights.len(), ""]);
    table.add_row(row!["self shadows", motion.self_shadows.len(), ""]);
    table.add_row(row!["show-ik", motion.show_ik.len(), ""]);
    table.printstd();
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct DiffCounts {
    equal: usize,
    not_equal: usize,
    a_only: usize,
    b_only: usize,
}

impl DiffCounts {
    fn differs(&self) -> bool {
        self.not_equal + self.a_only + self.b_only > 0
    }
}

/// Compares one section keyed by (frame, name); frame-only sections pass
/// an empty name. Per-key verdicts go to stdout unless `short`.
fn diff_section<T: PartialEq>(
    section: &str,
    a: &[T],
    b: &[T],
    key: impl Fn(&T) -> (u32, String),
    short: bool,
) -> DiffCounts {
    let map_a: BTreeMap<(u32, String), &T> = a.iter().map(|t| (key(t), t)).collect();
    let map_b: BTreeMap<(u32, String), &T> = b.iter().map(|t| (key(t), t)).collect();
    let mut counts = DiffCounts::default();
    let report = |key: &(u32, String), status: &str| {
        if !short {
            println!("{section} {} {}: {status}", key.0, key.1);
        }
    };
    for (k, x) in &map_a {
        match map_b.get(k) {
            Some(y) if x == y => counts.equal += 1,
            Some(_) => {
                counts.not_equal += 1;
                report(k, "NOT_EQUAL");
            }
            None => {
                counts.a_only += 1;
                report(k, "A_ONLY");
            }
        }
    }
    for k in map_b.keys().filter(|k| !map_a.contains_key(*k)) {
        counts.b_only += 1;
        report(k, "B_ONLY");
    }
    counts
}

fn handle_diff(path_a: &Path, path_b: &Path, names: &[String], short: bool) -> Result<()> {
    let a = open_motion(path_a)?;
    let b = open_motion(path_b)?;
    let keep = |name: &str| names.is_empty() || names.iter().any(|n| n == name);

    let a_bones: Vec<_> = a.bones.iter().filter(|f| keep(&f.name)).cloned().collect();
    let b_bones: Vec<_> = b.bones.iter().filter(|f| keep(&f.name)).cloned().collect();
    let a_morphs: Vec<_> = a.morphs.iter().filter(|f| keep(&f.name)).cloned().collect();
    let b_morphs: Vec<_> = b.morphs.iter().filter(|f| keep(&f.name)).cloned().collect();

    let sections = [
        (
            "bones",
            diff_section("bones", &a_bones, &b_bones, |f| (f.frame, f.name.clone()), short),
        ),
        (
            "morphs",
            diff_section("morphs", &a_morphs, &b_morphs, |f| (f.frame, f.name.clone()), short),
        ),
        (
            "cameras",
            diff_section("cameras", &a.cameras, &b.cameras, |f| (f.frame, String::new()), short),
        ),
        (
            "lights",
            diff_section("lights", &a.lights, &b.lights, |f| (f.frame, String::new()), short),
        ),
        (
            "self shadows",
            diff_section(
                "self shadows",
                &a.self_shadows,
                &b.self_shadows,
                |f| (f.frame, String::new()),
                short,
            ),
        ),
        (
            "show-ik",
            diff_section("show-ik", &a.show_ik, &b.show_ik, |f| (f.frame, String::new()), short),
        ),
    ];

    let mut table = Table::new();
    table.add_row(row!["Section", "EQUAL", "NOT_EQUAL", "A_ONLY", "B_ONLY"]);
    for (name, counts) in &sections {
        table.add_row(row![
            name,
            counts.equal,
            counts.not_equal,
            counts.a_only,
            counts.b_only
        ]);
    }
    table.printstd();

    if sections.iter().any(|(_, c)| c.differs()) {
        println!("motions differ");
    } else {
        println!("motions are equal");
    }
    Ok(())
}

fn handle_merge(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let (first, rest) = inputs
        .split_first()
        .context("at least one input motion is required")?;
    let mut merged = open_motion(first)?;
    for path in rest {
        let motion = open_motion(path)?;
        merged.bones.extend(motion.bones);
        merged.morphs.extend(motion.morphs);
        merged.cameras.extend(motion.cameras);
        merged.lights.extend(motion.lights);
        merged.self_shadows.extend(motion.self_shadows);
        merged.show_ik.extend(motion.show_ik);
    }
    save_motion(&merged, output)?;
    println!(
        "merged {} motions into {} ({} bone frames)",
        inputs.len(),
        output.display(),
        merged.bones.len()
    );
    Ok(())
}

fn save_motion(motion: &Motion, path: &Path) -> Result<()> {
    motion
        .save(path)
        .with_context(|| format!("failed to write motion {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use mmd_vmd::{BoneCurves, BoneFrame};

    fn frame(name: &str, number: u32, x: f32) -> BoneFrame {
        BoneFrame {
            name: name.to_string(),
            frame: number,
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            interpolation: BoneCurves::linear_block(),
        }
    }

    #[test]
    fn diff_counts_cover_all_outcomes() {
        let a = vec![frame("首", 0, 0.0), frame("首", 10, 1.0), frame("頭", 0, 0.0)];
        let b = vec![frame("首", 0, 0.0), frame("首", 10, 2.0), frame("首", 20, 0.0)];
        let counts = diff_section("bones", &a, &b, |f| (f.frame, f.name.clone()), true);
        assert_eq!(
            counts,
            DiffCounts {
                equal: 1,
                not_equal: 1,
                a_only: 1,
                b_only: 1,
            }
        );
        assert!(counts.differs());
    }

    #[test]
    fn identical_sections_do_not_differ() {
        let a = vec![frame("首", 0, 0.0)];
        let counts = diff_section("bones", &a, &a.clone(), |f| (f.frame, f.name.clone()), true);
        assert!(!counts.differs());
        assert_eq!(counts.equal, 1);
    }
}
