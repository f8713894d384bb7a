//! On-disk dataset loading, keyed by resolution.
//!
//! Expected layout under the data directory, for resolution `res`:
//!
//! - `subjects_sc{res}.npy` — structural matrices, shape `[n_subjects, N, N]`
//! - `subjects_fc{res}.npy` — functional matrices, shape `[n_subjects, N, N]`
//! - `euc_dist{res}.npy`    — Euclidean distance matrix, shape `[N, N]`
//! - `hubs_{res}.txt`, `regions_{res}.txt`, `func_regions_{res}.txt` —
//!   comma-separated zero-based region indices
//!
//! Any missing file or shape mismatch is fatal at load time, before training
//! starts.

use crate::connectome::{BrainDataset, Connectome, ScoreFn};
use crate::errors::{PrefPathError, Result};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::ReadNpyExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Resolves the six on-disk input paths for a resolution.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub sc: PathBuf,
    pub fc: PathBuf,
    pub euc_dist: PathBuf,
    pub hubs: PathBuf,
    pub regions: PathBuf,
    pub func_regions: PathBuf,
}

impl DatasetPaths {
    pub fn for_resolution(dir: &Path, res: usize) -> Self {
        Self {
            sc: dir.join(format!("subjects_sc{res}.npy")),
            fc: dir.join(format!("subjects_fc{res}.npy")),
            euc_dist: dir.join(format!("euc_dist{res}.npy")),
            hubs: dir.join(format!("hubs_{res}.txt")),
            regions: dir.join(format!("regions_{res}.txt")),
            func_regions: dir.join(format!("func_regions_{res}.txt")),
        }
    }
}

/// Loads the selected subjects and shared tables into a `BrainDataset`.
///
/// `subjects` are zero-based indices into the on-disk subject stacks; the
/// returned dataset holds them in the given order. An empty slice selects
/// every subject in the stack.
pub fn load_brain_dataset(
    dir: &Path,
    res: usize,
    subjects: &[usize],
    fns: Vec<ScoreFn>,
) -> Result<BrainDataset> {
    let paths = DatasetPaths::for_resolution(dir, res);
    log::info!(
        "Loading brain data for res {} ({} subjects) from {}",
        res,
        subjects.len(),
        dir.display()
    );

    let sc_stack = read_stack(&paths.sc)?;
    let fc_stack = read_stack(&paths.fc)?;
    if sc_stack.shape() != fc_stack.shape() {
        return Err(PrefPathError::shape(
            "functional matrix stack",
            format!("{:?}", sc_stack.shape()),
            format!("{:?}", fc_stack.shape()),
        ));
    }

    let n_on_disk = sc_stack.len_of(Axis(0));
    let all: Vec<usize>;
    let subjects = if subjects.is_empty() {
        all = (0..n_on_disk).collect();
        &all[..]
    } else {
        subjects
    };
    let mut connectomes = Vec::with_capacity(subjects.len());
    for &s in subjects {
        if s >= n_on_disk {
            return Err(PrefPathError::config(format!(
                "subject index {s} out of range (stack holds {n_on_disk} subjects)"
            )));
        }
        let sc = sc_stack.index_axis(Axis(0), s).to_owned();
        let fc = fc_stack.index_axis(Axis(0), s).to_owned();
        connectomes.push(Connectome::new(sc, fc, res)?);
    }

    let euc_dist = read_matrix(&paths.euc_dist)?;
    let hubs = read_index_table(&paths.hubs)?;
    let regions = read_index_table(&paths.regions)?;
    let func_regions = read_index_table(&paths.func_regions)?;

    BrainDataset::new(res, connectomes, euc_dist, hubs, regions, func_regions, fns)
}

fn read_stack(path: &Path) -> Result<Array3<f64>> {
    let file = open(path)?;
    Ok(Array3::<f64>::read_npy(file)?)
}

fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let file = open(path)?;
    Ok(Array2::<f64>::read_npy(file)?)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        PrefPathError::config(format!("cannot open dataset file {}: {e}", path.display()))
    })
}

/// Reads a comma-separated list of zero-based region indices.
fn read_index_table(path: &Path) -> Result<Vec<usize>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PrefPathError::config(format!("cannot open index table {}: {e}", path.display()))
    })?;
    content
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>().map_err(|_| {
                PrefPathError::config(format!(
                    "malformed index '{s}' in table {}",
                    path.display()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use ndarray_npy::WriteNpyExt;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fixture(dir: &Path, res: usize, n_subj: usize) {
        let n = res;
        let mut sc = Array3::<f64>::zeros((n_subj, n, n));
        let mut fc = Array3::<f64>::zeros((n_subj, n, n));
        for s in 0..n_subj {
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        sc[[s, i, j]] = 1.0 + ((i + j + s) % 3) as f64;
                        fc[[s, i, j]] = 0.1 * ((i + j) % 7) as f64;
                    }
                }
            }
        }
        let euc = Array2::<f64>::from_shape_fn((n, n), |(i, j)| {
            (i as f64 - j as f64).abs()
        });

        let paths = DatasetPaths::for_resolution(dir, res);
        sc.write_npy(File::create(&paths.sc).unwrap()).unwrap();
        fc.write_npy(File::create(&paths.fc).unwrap()).unwrap();
        euc.write_npy(File::create(&paths.euc_dist).unwrap()).unwrap();
        write!(File::create(&paths.hubs).unwrap(), "0,2").unwrap();
        let all: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        write!(File::create(&paths.regions).unwrap(), "{}", all.join(",")).unwrap();
        write!(File::create(&paths.func_regions).unwrap(), "0, 1, 3").unwrap();
    }

    #[test]
    fn test_load_selected_subjects() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), 4, 3);

        let ds = load_brain_dataset(
            tmp.path(),
            4,
            &[0, 2],
            vec![ScoreFn::Distance, ScoreFn::Hub],
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.res(), 4);
        assert_eq!(ds.hubs(), &[0, 2]);
        assert_eq!(ds.func_regions(), &[0, 1, 3]);
        // Subject 2 on disk differs from subject 0
        assert_ne!(ds.subject(0).sc(), ds.subject(1).sc());
    }

    #[test]
    fn test_empty_selection_loads_all_subjects() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), 4, 3);
        let ds = load_brain_dataset(tmp.path(), 4, &[], vec![ScoreFn::Distance]).unwrap();
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err =
            load_brain_dataset(tmp.path(), 4, &[0], vec![ScoreFn::Distance]).unwrap_err();
        assert!(matches!(err, PrefPathError::Config(_)));
    }

    #[test]
    fn test_subject_out_of_range_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path(), 4, 2);
        let err =
            load_brain_dataset(tmp.path(), 4, &[5], vec![ScoreFn::Distance]).unwrap_err();
        assert!(matches!(err, PrefPathError::Config(_)));
    }
}
