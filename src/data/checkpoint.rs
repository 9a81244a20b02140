use crate::config::RunConfig;
use crate::engines::generation::{FitnessRecord, Genome, ParameterBounds, Population};
use crate::error::{CpfaError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const FITNESS_COLUMN: &str = "fitness";
pub const SEED_COLUMN: &str = "seed";

/// One evaluated, sorted generation as written to disk.
///
/// Only a single seed is kept per generation (the last one drawn), not the
/// full list of trial seeds.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSnapshot {
    pub generation: usize,
    pub records: Vec<FitnessRecord>,
    pub seed: u32,
}

impl GenerationSnapshot {
    pub fn capture(population: &Population, seed: u32) -> Self {
        Self {
            generation: population.generation(),
            records: population.records().to_vec(),
            seed,
        }
    }
}

/// Writes `gen_<n>.gapy` tables into one run directory.
pub struct CheckpointStore {
    dir: PathBuf,
    bounds: ParameterBounds,
}

impl CheckpointStore {
    /// Opens (creating if needed) `dir`. Failure is fatal for the run.
    pub fn open<P: AsRef<Path>>(dir: P, bounds: ParameterBounds) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            CpfaError::Storage(format!(
                "Failed to create checkpoint directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir, bounds })
    }

    /// Run directory under `config.save_root`, named after the run settings.
    pub fn for_run(config: &RunConfig, start_time: i64, bounds: ParameterBounds) -> Result<Self> {
        Self::open(config.save_root.join(config.run_dir_name(start_time)), bounds)
    }

    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, generation: usize) -> PathBuf {
        self.dir.join(format!("gen_{}.gapy", generation))
    }

    /// Header: parameter names in bounds order, then `fitness`, then `seed`.
    pub fn save(&self, snapshot: &GenerationSnapshot) -> Result<PathBuf> {
        if let Some((row, record)) = snapshot
            .records
            .iter()
            .enumerate()
            .find(|(_, r)| r.genome.len() != self.bounds.len())
        {
            return Err(CpfaError::Configuration(format!(
                "Row {} has {} genes, table has {} parameter columns",
                row,
                record.genome.len(),
                self.bounds.len()
            )));
        }

        let mut columns: Vec<Column> = self
            .bounds
            .iter()
            .enumerate()
            .map(|(i, bound)| {
                let values: Vec<f64> = snapshot
                    .records
                    .iter()
                    .map(|r| r.genome.genes()[i])
                    .collect();
                Column::new(bound.name.as_str().into(), values)
            })
            .collect();

        let fitness: Vec<f64> = snapshot.records.iter().map(|r| r.fitness).collect();
        columns.push(Column::new(FITNESS_COLUMN.into(), fitness));
        let seeds: Vec<u64> = vec![snapshot.seed as u64; snapshot.records.len()];
        columns.push(Column::new(SEED_COLUMN.into(), seeds));

        let mut df = DataFrame::new(columns)
            .map_err(|e| CpfaError::Storage(format!("Failed to build generation table: {}", e)))?;

        let path = self.path_for(snapshot.generation);
        let mut file = File::create(&path).map_err(|e| {
            CpfaError::Storage(format!("Failed to create {}: {}", path.display(), e))
        })?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| CpfaError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

        log::info!(
            "Saved generation {} ({} rows) to {}",
            snapshot.generation,
            df.height(),
            path.display()
        );
        Ok(path)
    }

    /// Read back a generation written by [`save`](Self::save).
    pub fn load(&self, generation: usize) -> Result<GenerationSnapshot> {
        let path = self.path_for(generation);
        let df = read_table(&path)?;
        let records = records_from_table(&df, &self.bounds)?;

        let seeds = u64_column(&df, SEED_COLUMN)?;
        let seed = match seeds.first() {
            Some(&s) => u32::try_from(s).map_err(|_| {
                CpfaError::Serialization(format!("Seed {} does not fit in 32 bits", s))
            })?,
            None => 0,
        };

        Ok(GenerationSnapshot {
            generation,
            records,
            seed,
        })
    }
}

/// Rows of a generation table in file order; needs only the parameter columns
/// and `fitness`, any other columns are ignored.
pub fn read_population<P: AsRef<Path>>(path: P, bounds: &ParameterBounds) -> Result<Vec<FitnessRecord>> {
    let df = read_table(path.as_ref())?;
    records_from_table(&df, bounds)
}

fn read_table(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(CpfaError::Serialization(format!(
            "Generation table not found: {}",
            path.display()
        )));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| {
            CpfaError::Serialization(format!("Failed to read {}: {}", path.display(), e))
        })
}

fn records_from_table(df: &DataFrame, bounds: &ParameterBounds) -> Result<Vec<FitnessRecord>> {
    let gene_columns = bounds
        .names()
        .map(|name| f64_column(df, name))
        .collect::<Result<Vec<_>>>()?;
    let fitness = f64_column(df, FITNESS_COLUMN)?;

    (0..df.height())
        .map(|row| -> Result<FitnessRecord> {
            let genes = gene_columns.iter().map(|col| col[row]).collect();
            let genome = Genome::new(bounds, genes).map_err(|e| {
                CpfaError::Serialization(format!("Row {}: {}", row, e))
            })?;
            Ok(FitnessRecord::new(genome, fitness[row]))
        })
        .collect()
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| CpfaError::Serialization(format!("Missing column '{}'", name)))?;
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| CpfaError::Serialization(format!("Column '{}' is not numeric: {}", name, e)))?;
    let values = cast
        .f64()
        .map_err(|e| CpfaError::Serialization(format!("Column '{}': {}", name, e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                CpfaError::Serialization(format!("Null '{}' value at row {}", name, row))
            })
        })
        .collect()
}

fn u64_column(df: &DataFrame, name: &str) -> Result<Vec<u64>> {
    let column = df
        .column(name)
        .map_err(|_| CpfaError::Serialization(format!("Missing column '{}'", name)))?;
    let cast = column
        .cast(&DataType::UInt64)
        .map_err(|e| CpfaError::Serialization(format!("Column '{}' is not an integer: {}", name, e)))?;
    let values = cast
        .u64()
        .map_err(|e| CpfaError::Serialization(format!("Column '{}': {}", name, e)))?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                CpfaError::Serialization(format!("Null '{}' value at row {}", name, row))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::bounds::{ParamBound, CPFA_PARAMETERS};

    fn snapshot(bounds: &ParameterBounds) -> GenerationSnapshot {
        let records = vec![
            FitnessRecord::new(
                Genome::new(bounds, vec![0.9, 0.01, 200.5, 0.3, 19.0, 0.125, 0.7]).unwrap(),
                42.5,
            ),
            FitnessRecord::new(
                Genome::new(bounds, vec![0.1 + 0.2, 0.0, 359.0, 1.0, 0.0, 20.0, 0.0]).unwrap(),
                7.0,
            ),
        ];
        GenerationSnapshot {
            generation: 3,
            records,
            seed: 4_000_000_000,
        }
    }

    #[test]
    fn test_save_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let bounds = ParameterBounds::cpfa();
        let store = CheckpointStore::open(dir.path().join("run"), bounds.clone()).unwrap();

        let path = store.save(&snapshot(&bounds)).unwrap();
        assert_eq!(path.file_name().unwrap(), "gen_3.gapy");

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let mut expected: Vec<&str> = CPFA_PARAMETERS.to_vec();
        expected.push(FITNESS_COLUMN);
        expected.push(SEED_COLUMN);
        assert_eq!(header, expected);
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn test_load_restores_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let bounds = ParameterBounds::cpfa();
        let store = CheckpointStore::open(dir.path(), bounds.clone()).unwrap();
        let original = snapshot(&bounds);
        store.save(&original).unwrap();

        let loaded = store.load(3).unwrap();
        assert_eq!(loaded.generation, 3);
        assert_eq!(loaded.seed, 4_000_000_000);
        assert_eq!(loaded.records.len(), 2);
        for (a, b) in original.records.iter().zip(&loaded.records) {
            assert!((a.fitness - b.fitness).abs() < 1e-12);
            for (x, y) in a.genome.genes().iter().zip(b.genome.genes()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_read_population_minimal_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.gapy");
        let mut text = CPFA_PARAMETERS.join(",");
        text.push_str(",fitness\n");
        text.push_str("0.5,0.5,100,0.5,5,5,0.5,12\n");
        text.push_str("0.25,0.75,10,0.1,1,2,0.3,3\n");
        std::fs::write(&path, text).unwrap();

        let bounds = ParameterBounds::cpfa();
        let records = read_population(&path, &bounds).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fitness, 12.0);
        assert_eq!(records[1].genome.genes()[2], 10.0);
    }

    #[test]
    fn test_missing_fitness_column_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gapy");
        let mut text = CPFA_PARAMETERS.join(",");
        text.push('\n');
        text.push_str("0.5,0.5,100,0.5,5,5,0.5\n");
        std::fs::write(&path, text).unwrap();

        let result = read_population(&path, &ParameterBounds::cpfa());
        assert!(matches!(result, Err(CpfaError::Serialization(_))));
    }

    #[test]
    fn test_out_of_bounds_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gapy");
        let mut text = CPFA_PARAMETERS.join(",");
        text.push_str(",fitness\n");
        text.push_str("1.5,0.5,100,0.5,5,5,0.5,12\n");
        std::fs::write(&path, text).unwrap();

        assert!(read_population(&path, &ParameterBounds::cpfa()).is_err());
    }

    #[test]
    fn test_null_cell_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holes.gapy");
        let mut text = CPFA_PARAMETERS.join(",");
        text.push_str(",fitness\n");
        text.push_str("0.5,0.5,100,0.5,5,5,0.5,12\n");
        text.push_str("0.25,,10,0.1,1,2,0.3,3\n");
        std::fs::write(&path, text).unwrap();

        let result = read_population(&path, &ParameterBounds::cpfa());
        assert!(matches!(result, Err(CpfaError::Serialization(_))));
    }

    #[test]
    fn test_save_rejects_genome_of_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path(), ParameterBounds::cpfa()).unwrap();
        let one = ParameterBounds::new(vec![ParamBound::new("a", 0.0, 1.0)]).unwrap();
        let snapshot = GenerationSnapshot {
            generation: 0,
            records: vec![FitnessRecord::new(Genome::new(&one, vec![0.5]).unwrap(), 1.0)],
            seed: 1,
        };

        let result = store.save(&snapshot);
        assert!(matches!(result, Err(CpfaError::Configuration(_))));
        assert!(!store.path_for(0).exists());
    }

    #[test]
    fn test_missing_file() {
        let result = read_population("/nonexistent/gen_0.gapy", &ParameterBounds::cpfa());
        assert!(matches!(result, Err(CpfaError::Serialization(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_uncreatable_directory_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let result = CheckpointStore::open(blocker.join("run"), ParameterBounds::cpfa());
        assert!(matches!(result, Err(CpfaError::Storage(_))));
    }
}
