//! # Weight Posterior Store
//!
//! Owns the canonical Gaussian belief of every feature weight the model has
//! seen. Absent features implicitly carry the prior `(0, init_var)`: readers
//! get the prior without inserting it, trainers materialize it on first access.
//!
//! The on-disk encoding is one line per feature, `id \t mean \t variance`, with
//! no header. Floats are written with `ryu` (shortest round-trip form) so a
//! save/load cycle reproduces every belief bit-for-bit.

use crate::gaussian::GaussianBelief;
use crate::types::FeatureId;
use ahash::AHashMap;
use itertools::Itertools;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read or write model file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed model file at line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}

#[derive(Debug, Clone)]
pub struct WeightPosteriorStore {
    prior: GaussianBelief,
    beliefs: AHashMap<FeatureId, GaussianBelief>,
}

impl WeightPosteriorStore {
    /// An empty store whose absent entries read as `(0, init_var)`.
    pub fn new(init_var: f64) -> Self {
        Self {
            prior: GaussianBelief::centered(init_var),
            beliefs: AHashMap::new(),
        }
    }

    pub fn prior(&self) -> GaussianBelief {
        self.prior
    }

    /// Read-only lookup; unseen features yield the prior and are not inserted.
    pub fn get(&self, id: FeatureId) -> GaussianBelief {
        self.beliefs.get(&id).copied().unwrap_or(self.prior)
    }

    /// Training lookup; unseen features are inserted with the prior.
    pub fn get_or_create(&mut self, id: FeatureId) -> GaussianBelief {
        *self.beliefs.entry(id).or_insert(self.prior)
    }

    /// The stored belief, if the feature has been materialized.
    pub fn lookup(&self, id: FeatureId) -> Option<GaussianBelief> {
        self.beliefs.get(&id).copied()
    }

    pub fn set(&mut self, id: FeatureId, belief: GaussianBelief) {
        self.beliefs.insert(id, belief);
    }

    /// Drops every entry and releases the backing allocation.
    pub fn clear(&mut self) {
        self.beliefs = AHashMap::new();
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }

    /// Iterates entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, GaussianBelief)> + '_ {
        self.beliefs.iter().map(|(&id, &belief)| (id, belief))
    }

    /// Writes the encoding to `writer`, sorted by feature id.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut mean_buffer = ryu::Buffer::new();
        let mut variance_buffer = ryu::Buffer::new();
        for (id, belief) in self.beliefs.iter().sorted_unstable_by_key(|(id, _)| **id) {
            writeln!(
                writer,
                "{id}\t{}\t{}",
                mean_buffer.format(belief.mean),
                variance_buffer.format(belief.variance)
            )?;
        }
        Ok(())
    }

    /// Saves the store to `path` through a temporary sibling file that is
    /// renamed into place only once fully written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        let write_result = (|| -> io::Result<()> {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            self.write_to(&mut writer)?;
            writer.flush()?;
            let file = writer.into_inner().map_err(io::Error::other)?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(io_err(err));
        }
        fs::rename(&temp_path, path)
            .inspect_err(|_| {
                let _ = fs::remove_file(&temp_path);
            })
            .map_err(io_err)?;

        log::info!("Saved {} feature beliefs to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads an encoding from `reader` and merges it into the store.
    ///
    /// The whole input is parsed before anything is inserted: a malformed line
    /// aborts the load and leaves the store untouched. Later lines overwrite
    /// earlier ones with the same id. Returns the number of lines loaded.
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<usize, StoreError> {
        let mut parsed = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|e| StoreError::MalformedLine {
                line: line_number,
                reason: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            parsed.push(parse_line(&line, line_number)?);
        }
        let count = parsed.len();
        self.beliefs.reserve(count);
        self.beliefs.extend(parsed);
        Ok(count)
    }

    /// Loads a model file written by [`save`](Self::save) into the store.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let count = self.read_from(BufReader::new(file))?;
        log::info!("Loaded {count} feature beliefs from {}", path.display());
        Ok(count)
    }
}

fn parse_line(line: &str, line_number: usize) -> Result<(FeatureId, GaussianBelief), StoreError> {
    let malformed = |reason: String| StoreError::MalformedLine {
        line: line_number,
        reason,
    };

    let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
    let [id_field, mean_field, variance_field] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        )));
    };

    let id = lexical_core::parse::<FeatureId>(id_field.as_bytes())
        .map_err(|_| malformed(format!("invalid feature id '{id_field}'")))?;
    let mean = lexical_core::parse::<f64>(mean_field.as_bytes())
        .map_err(|_| malformed(format!("invalid mean '{mean_field}'")))?;
    let variance = lexical_core::parse::<f64>(variance_field.as_bytes())
        .map_err(|_| malformed(format!("invalid variance '{variance_field}'")))?;

    let belief = GaussianBelief::new(mean, variance);
    if !belief.is_valid() {
        return Err(malformed(format!(
            "belief ({mean}, {variance}) must have a finite mean and a finite positive variance"
        )));
    }
    Ok((id, belief))
}
