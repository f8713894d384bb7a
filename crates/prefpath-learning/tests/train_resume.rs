//! End-to-end train / save / resume cycle through the on-disk checkpoint.

use ndarray::Array2;
use prefpath_core::{BrainDataset, Connectome, PrefPathError, RunContext, ScoreFn};
use prefpath_learning::{Checkpoint, PathMethod, ReinforceTrainer, RunMode, TrainConfig};

fn dataset() -> BrainDataset {
    let n = 5;
    let mut sc = Array2::<f64>::zeros((n, n));
    for (i, j, w) in [
        (0, 1, 2.0),
        (1, 2, 3.0),
        (2, 3, 3.0),
        (3, 4, 2.0),
        (0, 4, 0.5),
        (1, 3, 1.5),
    ] {
        sc[[i, j]] = w;
        sc[[j, i]] = w;
    }
    let fc = Array2::<f64>::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            1.0
        } else {
            0.9 - 0.12 * (i as f64 - j as f64).abs()
        }
    });
    let euc = Array2::<f64>::from_shape_fn((n, n), |(i, j)| (i as f64 - j as f64).abs());
    BrainDataset::new(
        n,
        vec![Connectome::new(sc, fc, n).unwrap()],
        euc,
        vec![2],
        (0..n).collect(),
        vec![0, 2, 4],
        vec![ScoreFn::Distance, ScoreFn::Hub],
    )
    .unwrap()
}

fn cfg(epochs: u64, save_path: Option<std::path::PathBuf>) -> TrainConfig {
    TrainConfig {
        epochs,
        samples: 8,
        save_path,
        path_method: PathMethod::Shortest,
        ..TrainConfig::default()
    }
}

#[test]
fn train_save_resume_continues_histories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ckpt");
    let data = dataset();

    let mut ctx = RunContext::new(Some(21));
    let mut trainer =
        ReinforceTrainer::new(&data, cfg(3, Some(path.clone())), RunMode::Fresh, &mut ctx)
            .unwrap();
    trainer.run(&mut ctx).unwrap();
    let before = trainer.checkpoint();
    assert_eq!(before.epochs, 3);

    let loaded = Checkpoint::load(&path).unwrap();
    assert_eq!(loaded, before);

    let mut ctx2 = RunContext::new(Some(22));
    let mut resumed = ReinforceTrainer::new(
        &data,
        cfg(2, Some(path.clone())),
        RunMode::Resumed(loaded),
        &mut ctx2,
    )
    .unwrap();
    resumed.run(&mut ctx2).unwrap();

    let after = Checkpoint::load(&path).unwrap();
    assert_eq!(after.epochs, 5);
    assert_eq!(after.rewards.len(), 5);
    // The first three epochs carry over untouched.
    assert_eq!(&after.rewards[..3], &before.rewards[..]);
    assert_eq!(after.train_idx, before.train_idx);
    assert!(after.mu.iter().all(|s| s.len() == 5));
}

#[test]
fn resume_with_different_fn_set_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ckpt");
    let data = dataset();

    let mut ctx = RunContext::new(Some(4));
    let mut trainer =
        ReinforceTrainer::new(&data, cfg(1, Some(path.clone())), RunMode::Fresh, &mut ctx)
            .unwrap();
    trainer.run(&mut ctx).unwrap();

    // Same matrices, but the run now configures only the distance criterion.
    let narrowed = BrainDataset::new(
        data.res(),
        vec![data.subject(0).clone()],
        data.euc_dist().clone(),
        data.hubs().to_vec(),
        data.regions().to_vec(),
        data.func_regions().to_vec(),
        vec![ScoreFn::Distance],
    )
    .unwrap();

    let loaded = Checkpoint::load(&path).unwrap();
    let mut ctx2 = RunContext::new(Some(4));
    let err = ReinforceTrainer::new(&narrowed, cfg(1, None), RunMode::Resumed(loaded), &mut ctx2)
        .unwrap_err();
    assert!(matches!(err, PrefPathError::FnMismatch { .. }));
}

#[test]
fn save_freq_gates_intermediate_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.ckpt");
    let data = dataset();

    let mut ctx = RunContext::new(Some(13));
    let mut trainer = ReinforceTrainer::new(
        &data,
        TrainConfig {
            save_freq: 10,
            ..cfg(2, Some(path.clone()))
        },
        RunMode::Fresh,
        &mut ctx,
    )
    .unwrap();
    trainer.run(&mut ctx).unwrap();

    // Frequency never aligned, but the loop-exit save still happened.
    let loaded = Checkpoint::load(&path).unwrap();
    assert_eq!(loaded.epochs, 2);
}
