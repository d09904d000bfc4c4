//! Stratified train/test splitter.
//!
//! Rows are grouped by the raw value of the target column. Each class is
//! shuffled with a seeded `StdRng` and cut into a train share and a test
//! share whose sizes come from a largest-remainder allocation, so every class
//! keeps its proportion in both outputs. Both outputs are then shuffled once
//! more and written as CSV with the target column moved to the end.

use crate::dataset::{ColumnKind, Dataset};
use crate::error::PrepError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";

/// Fraction and seed for a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitParams {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
        }
    }
}

/// Paths of the two files written by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitFiles {
    pub train: PathBuf,
    pub test: PathBuf,
}

/// Row indices assigned to each side, in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `dataset_path` into `destination_dir/train.csv` and
/// `destination_dir/test.csv` with a 0.3 test fraction and seed 42.
pub fn split(
    dataset_path: &Path,
    destination_dir: &Path,
    target_column: &str,
) -> Result<SplitFiles, PrepError> {
    split_with(
        dataset_path,
        destination_dir,
        target_column,
        &SplitParams::default(),
    )
}

/// [`split`] with an explicit fraction and seed.
///
/// Nothing is written unless loading, column lookup, and partitioning all
/// succeed. Existing output files are replaced.
pub fn split_with(
    dataset_path: &Path,
    destination_dir: &Path,
    target_column: &str,
    params: &SplitParams,
) -> Result<SplitFiles, PrepError> {
    let dataset = Dataset::from_csv_path(dataset_path)?;
    let target = dataset.column_index(target_column)?;

    let target_kind = dataset.column_kind(target);
    tracing::info!(
        path = %dataset_path.display(),
        rows = dataset.len(),
        columns = dataset.headers().len(),
        target = target_column,
        ?target_kind,
        "loaded dataset"
    );

    let keys: Vec<String> = dataset
        .column(target)
        .map(|v| class_key(v, target_kind))
        .collect();
    let labels: Vec<&str> = keys.iter().map(String::as_str).collect();
    let partition = stratified_partition(&labels, params)?;

    fs::create_dir_all(destination_dir).map_err(|e| PrepError::io(destination_dir, e))?;

    let files = SplitFiles {
        train: destination_dir.join(TRAIN_FILE_NAME),
        test: destination_dir.join(TEST_FILE_NAME),
    };
    for path in [&files.train, &files.test] {
        if path.exists() {
            tracing::warn!(path = %path.display(), "overwriting existing split output");
        }
    }

    write_subset(&files.train, &dataset, target, &partition.train)?;
    write_subset(&files.test, &dataset, target, &partition.test)?;

    tracing::info!(
        train = partition.train.len(),
        test = partition.test.len(),
        dir = %destination_dir.display(),
        "wrote stratified split"
    );

    Ok(files)
}

/// Class of a target cell.
///
/// Surrounding whitespace is ignored. In a numeric column the parsed value
/// decides the class, so `1`, `1.0` and ` 1` are one class. Output files
/// still carry the raw cell text.
pub fn class_key(value: &str, kind: ColumnKind) -> String {
    let trimmed = value.trim();
    if kind == ColumnKind::Numeric {
        if let Ok(v) = trimmed.parse::<f64>() {
            // -0 and 0 compare equal
            let v = if v == 0.0 { 0.0 } else { v };
            return v.to_string();
        }
    }
    trimmed.to_string()
}

/// Number of test rows for `n` samples: `ceil(fraction * n)`.
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    (test_fraction * n as f64).ceil() as usize
}

/// Compute a stratified partition of row indices from per-row labels.
///
/// Fails with [`PrepError::Validation`] if the input is empty, any class has
/// fewer than two rows, or either side would be smaller than the number of
/// classes.
pub fn stratified_partition(
    labels: &[&str],
    params: &SplitParams,
) -> Result<Partition, PrepError> {
    let n = labels.len();
    if n == 0 {
        return Err(PrepError::Validation("cannot split an empty dataset".into()));
    }

    // Lexicographic class order, member indices in original row order.
    let mut classes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        classes.entry(label).or_default().push(i);
    }

    if let Some((label, members)) = classes.iter().find(|(_, m)| m.len() < 2) {
        return Err(PrepError::Validation(format!(
            "class '{label}' has {} row(s); stratified split needs at least 2 per class",
            members.len()
        )));
    }

    let n_test = test_size(n, params.test_fraction);
    let n_train = n.saturating_sub(n_test);
    let n_classes = classes.len();
    if n_train < n_classes {
        return Err(PrepError::Validation(format!(
            "train size {n_train} is smaller than the number of classes ({n_classes})"
        )));
    }
    if n_test < n_classes {
        return Err(PrepError::Validation(format!(
            "test size {n_test} is smaller than the number of classes ({n_classes})"
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);

    let counts: Vec<usize> = classes.values().map(Vec::len).collect();
    let train_alloc = approximate_mode(&counts, n_train, &mut rng);
    let remaining: Vec<usize> = counts
        .iter()
        .zip(&train_alloc)
        .map(|(c, t)| c - t)
        .collect();
    let test_alloc = approximate_mode(&remaining, n_test, &mut rng);

    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (((label, members), n_i), t_i) in classes.iter().zip(&train_alloc).zip(&test_alloc) {
        tracing::debug!(
            class = label,
            total = members.len(),
            train = n_i,
            test = t_i,
            "class allocation"
        );
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        train.extend_from_slice(&shuffled[..*n_i]);
        test.extend_from_slice(&shuffled[*n_i..n_i + t_i]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(Partition { train, test })
}

/// Allocate `draws` across classes in proportion to `counts`.
///
/// Each class first gets the floor of its continuous share. Leftover draws go
/// to the classes with the largest fractional remainders; when more classes
/// share a remainder than there are draws left, the winners are picked at
/// random. The result never exceeds `counts` element-wise and sums to `draws`
/// whenever `draws <= counts.sum()`.
pub fn approximate_mode(counts: &[usize], draws: usize, rng: &mut StdRng) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let continuous: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 / total as f64 * draws as f64)
        .collect();
    let mut alloc: Vec<usize> = continuous.iter().map(|c| c.floor() as usize).collect();
    let mut need = draws.saturating_sub(alloc.iter().sum());
    if need == 0 {
        return alloc;
    }

    let remainders: Vec<f64> = continuous
        .iter()
        .zip(&alloc)
        .map(|(c, &a)| c - a as f64)
        .collect();

    let mut levels = remainders.clone();
    levels.sort_by(|a, b| b.total_cmp(a));
    levels.dedup();

    for level in levels {
        let tied: Vec<usize> = remainders
            .iter()
            .enumerate()
            .filter(|(i, &r)| r == level && alloc[*i] < counts[*i])
            .map(|(i, _)| i)
            .collect();
        let take = tied.len().min(need);
        for &i in tied.choose_multiple(rng, take) {
            alloc[i] += 1;
        }
        need -= take;
        if need == 0 {
            break;
        }
    }

    alloc
}

/// Write the rows at `indices` with features first and the target column last.
///
/// The file is written beside its destination and renamed into place.
fn write_subset(
    path: &Path,
    dataset: &Dataset,
    target: usize,
    indices: &[usize],
) -> Result<(), PrepError> {
    let order: Vec<usize> = (0..dataset.headers().len())
        .filter(|&c| c != target)
        .chain(std::iter::once(target))
        .collect();

    let tmp_path = path.with_extension("csv.tmp");
    let result = write_csv(&tmp_path, dataset, &order, indices);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PrepError::io(path, e)
    })
}

fn write_csv(
    path: &Path,
    dataset: &Dataset,
    order: &[usize],
    indices: &[usize],
) -> Result<(), PrepError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_write_error(path, e))?;

    let headers = dataset.headers();
    wtr.write_record(order.iter().map(|&c| headers[c].as_str()))
        .map_err(|e| csv_write_error(path, e))?;

    let rows = dataset.rows();
    for &i in indices {
        let row = &rows[i];
        wtr.write_record(order.iter().map(|&c| row[c].as_str()))
            .map_err(|e| csv_write_error(path, e))?;
    }

    wtr.flush().map_err(|e| PrepError::io(path, e))
}

fn csv_write_error(path: &Path, err: csv::Error) -> PrepError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => PrepError::io(path, e),
        other => PrepError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::Other, format!("{other:?}")),
        ),
    }
}
