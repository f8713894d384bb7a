//! Preferred-path policy training CLI.
//!
//! Loads a subject connectome dataset, trains the path-preference policy by
//! REINFORCE, and checkpoints the run. Alongside the checkpoint it writes a
//! plain-text `params_<name>.txt` summary and a JSON run manifest.
//!
//! Usage:
//!   prefpath-train --data-dir /path/to/data --res 219 --subj 1 \
//!     --epoch 50 --sample 100 --fns distance,hub --save runs/s001.ckpt

use anyhow::Context;
use clap::Parser;
use prefpath_core::{load_brain_dataset, RunContext, ScoreFn};
use prefpath_learning::{
    Checkpoint, PathMethod, ReinforceTrainer, RunMode, TrainConfig,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Preferred-path policy training over structural connectomes
#[derive(Parser)]
#[command(name = "prefpath-train")]
#[command(about = "Train per-criterion path-preference policies by REINFORCE")]
struct Cli {
    /// Directory containing the NPY matrix stacks and region index tables
    #[arg(long)]
    data_dir: PathBuf,

    /// Network resolution (region count per subject)
    #[arg(long, default_value_t = 219)]
    res: usize,

    /// One-based subject number; 0 trains across every subject on disk
    #[arg(long, default_value_t = 0)]
    subj: usize,

    /// Epochs to run in this invocation (accumulates across resumes)
    #[arg(long, default_value_t = 1)]
    epoch: u64,

    /// Subjects folded into one optimizer step
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Monte-Carlo coefficient draws per subject per epoch
    #[arg(long, default_value_t = 100)]
    sample: usize,

    /// Hidden-layer width of the policy network
    #[arg(long, default_value_t = 10)]
    hu: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    lr: f64,

    /// Checkpoint file to write (summary and manifest land next to it)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Checkpoint file to resume from
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save every this many epochs
    #[arg(long, default_value_t = 1)]
    save_freq: u64,

    /// Quiet mode (warnings and errors only)
    #[arg(long)]
    nolog: bool,

    /// Path strategy: 'shortest' or 'navigation'
    #[arg(long, default_value = "shortest")]
    path_method: String,

    /// RNG seed; omitted means nondeterministic
    #[arg(long)]
    seed: Option<u64>,

    /// Constant initial value for all network weights
    #[arg(long)]
    init_weight: Option<f64>,

    /// Fixed sigma for every criterion (removes the learned sigma head)
    #[arg(long)]
    const_sig: Option<f64>,

    /// Clamp sampled coefficients to >= 0 before scoring
    #[arg(long)]
    pos_only: bool,

    /// Ordered scoring criteria, comma-separated
    #[arg(long, value_delimiter = ',', default_value = "distance")]
    fns: Vec<String>,
}

impl Cli {
    /// `s001`-style tag for one subject, `x484`-style for the full cohort.
    fn subject_tag(&self, n_subjects: usize) -> String {
        if self.subj == 0 {
            format!("x{n_subjects}")
        } else {
            format!("s{:03}", self.subj)
        }
    }
}

/// Resolved run configuration, recorded next to the checkpoint.
#[derive(Serialize)]
struct RunManifest<'a> {
    created: String,
    subject: String,
    res: usize,
    n_subjects: usize,
    fns: &'a [String],
    path_method: &'a str,
    epochs_total: u64,
    batch: usize,
    samples: usize,
    hidden_units: usize,
    lr: f64,
    pos_only: bool,
    const_sig: Option<f64>,
    init_weight: Option<f64>,
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.nolog { "warn" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .init();
    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let fns = ScoreFn::parse_list(&cli.fns)?;
    let method: PathMethod = cli.path_method.parse()?;
    let subjects: Vec<usize> = if cli.subj == 0 {
        Vec::new()
    } else {
        vec![cli.subj - 1]
    };

    let data = load_brain_dataset(&cli.data_dir, cli.res, &subjects, fns)
        .with_context(|| format!("loading dataset from {}", cli.data_dir.display()))?;

    let mode = match &cli.load {
        Some(path) => {
            let ckpt = Checkpoint::load(path)
                .with_context(|| format!("loading checkpoint {}", path.display()))?;
            RunMode::Resumed(ckpt)
        }
        None => RunMode::Fresh,
    };

    let cfg = TrainConfig {
        epochs: cli.epoch,
        batch: cli.batch,
        samples: cli.sample,
        lr: cli.lr,
        hidden_units: cli.hu,
        init_weight: cli.init_weight,
        const_sig: cli.const_sig,
        pos_only: cli.pos_only,
        path_method: method,
        save_path: cli.save.clone(),
        save_freq: cli.save_freq,
    };

    let mut ctx = RunContext::new(cli.seed);
    let mut trainer = ReinforceTrainer::new(&data, cfg, mode, &mut ctx)?;
    trainer.run(&mut ctx)?;

    if let Some(save) = &cli.save {
        write_summary(save, &cli, &trainer, data.len())
            .with_context(|| "writing parameter summary")?;
        write_manifest(save, &cli, &trainer, data.len())
            .with_context(|| "writing run manifest")?;
    }

    log::info!(
        "✅ done: {} epochs total, last reward {:.4}",
        trainer.epochs_done(),
        trainer.rewards().last().copied().unwrap_or(0.0)
    );
    Ok(())
}

/// Plain-text key=value summary, `params_<name>.txt` next to the checkpoint.
fn write_summary(
    save: &Path,
    cli: &Cli,
    trainer: &ReinforceTrainer<'_>,
    n_subjects: usize,
) -> anyhow::Result<()> {
    let stem = save
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "run".to_string());
    let path = save.with_file_name(format!("params_{stem}.txt"));

    let mut out = String::new();
    out.push_str(&format!("subject={}\n", cli.subject_tag(n_subjects)));
    out.push_str(&format!("res={}\n", cli.res));
    out.push_str(&format!("epochs={}\n", trainer.epochs_done()));
    out.push_str(&format!("batch={}\n", cli.batch));
    out.push_str(&format!("sample={}\n", cli.sample));
    out.push_str(&format!("hu={}\n", cli.hu));
    out.push_str(&format!("lr={}\n", cli.lr));
    out.push_str(&format!("fns={}\n", cli.fns.join(",")));
    out.push_str(&format!("path_method={}\n", cli.path_method));
    out.push_str(&format!("pos_only={}\n", cli.pos_only));
    if let Some(s) = cli.const_sig {
        out.push_str(&format!("const_sig={s}\n"));
    }
    if let Some(w) = cli.init_weight {
        out.push_str(&format!("init_weight={w}\n"));
    }
    if let Some(seed) = cli.seed {
        out.push_str(&format!("seed={seed}\n"));
    }
    out.push_str(&format!(
        "train/cv/test={}/{}/{}\n",
        trainer.train_idx().len(),
        trainer.cv_idx().len(),
        trainer.test_idx().len()
    ));
    if let Some(r) = trainer.rewards().last() {
        out.push_str(&format!("final_reward={r}\n"));
    }
    if let Some(s) = trainer.success().last() {
        out.push_str(&format!("final_success={s}\n"));
    }

    fs::write(&path, out)?;
    log::info!("📄 summary written to {}", path.display());
    Ok(())
}

/// JSON manifest of the resolved configuration, `<name>.manifest.json`.
fn write_manifest(
    save: &Path,
    cli: &Cli,
    trainer: &ReinforceTrainer<'_>,
    n_subjects: usize,
) -> anyhow::Result<()> {
    let manifest = RunManifest {
        created: chrono::Utc::now().to_rfc3339(),
        subject: cli.subject_tag(n_subjects),
        res: cli.res,
        n_subjects,
        fns: &cli.fns,
        path_method: &cli.path_method,
        epochs_total: trainer.epochs_done(),
        batch: cli.batch,
        samples: cli.sample,
        hidden_units: cli.hu,
        lr: cli.lr,
        pos_only: cli.pos_only,
        const_sig: cli.const_sig,
        init_weight: cli.init_weight,
        seed: cli.seed,
    };
    let path = save.with_extension("manifest.json");
    fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_tag_formats() {
        let mut cli = Cli::parse_from(["prefpath-train", "--data-dir", "/tmp/d"]);
        assert_eq!(cli.subject_tag(484), "x484");
        cli.subj = 7;
        assert_eq!(cli.subject_tag(484), "s007");
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let cli = Cli::parse_from(["prefpath-train", "--data-dir", "/tmp/d"]);
        assert_eq!(cli.res, 219);
        assert_eq!(cli.epoch, 1);
        assert_eq!(cli.batch, 1);
        assert_eq!(cli.sample, 100);
        assert_eq!(cli.hu, 10);
        assert_eq!(cli.lr, 1e-3);
        assert_eq!(cli.save_freq, 1);
        assert_eq!(cli.fns, vec!["distance".to_string()]);
        assert_eq!(cli.path_method, "shortest");
    }

    #[test]
    fn test_fn_list_is_comma_separated() {
        let cli = Cli::parse_from([
            "prefpath-train",
            "--data-dir",
            "/tmp/d",
            "--fns",
            "distance,hub",
        ]);
        assert_eq!(cli.fns, vec!["distance".to_string(), "hub".to_string()]);
    }
}
