//! # Sparse Example Loading
//!
//! Training and prediction inputs are plain text, one example per line:
//!
//! ```text
//! <label> <id>:<value> <id>:<value> ...
//! ```
//!
//! Tokens are separated by any whitespace. Blank lines and `#` comments are
//! skipped. Files ending in `.gz` are decompressed on the fly. Every other
//! irregularity is a hard error that names the offending line: a silently
//! dropped token would bias the model without any trace.

use crate::types::{Example, FeatureActivation, FeatureId};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Line {line}: label '{token}' is not a finite number.")]
    InvalidLabel { line: usize, token: String },
    #[error("Line {line}: feature token '{token}' is not of the form <id>:<value>.")]
    InvalidFeature { line: usize, token: String },
    #[error("Line {line}: feature {id} has non-finite value '{token}'.")]
    NonFiniteValue {
        line: usize,
        id: FeatureId,
        token: String,
    },
}

/// Options applied to every loaded example.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Appends `(id, 1.0)` to every example, acting as a global bias term.
    pub bias_feature: Option<FeatureId>,
}

/// Streams examples from any buffered reader.
pub struct ExampleReader<R: BufRead> {
    reader: R,
    options: LoadOptions,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> ExampleReader<R> {
    pub fn new(reader: R, options: LoadOptions) -> Self {
        Self {
            reader,
            options,
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl ExampleReader<BufReader<Box<dyn Read + Send>>> {
    /// Opens `path`, decompressing it when the extension is `.gz`.
    pub fn open(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self, DataError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let source: Box<dyn Read + Send> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self::new(BufReader::new(source), options))
    }
}

impl<R: BufRead> Iterator for ExampleReader<R> {
    type Item = Result<Example, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_number += 1;
            let line = self.buffer.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(parse_example(line, self.line_number, &self.options));
        }
    }
}

/// Parses one non-empty example line.
pub fn parse_example(
    line: &str,
    line_number: usize,
    options: &LoadOptions,
) -> Result<Example, DataError> {
    let mut tokens = line.split_whitespace();
    let label_token = tokens.next().unwrap_or_default();
    let label = lexical_core::parse::<f64>(label_token.as_bytes())
        .ok()
        .filter(|l| l.is_finite())
        .ok_or_else(|| DataError::InvalidLabel {
            line: line_number,
            token: label_token.to_string(),
        })?;

    let mut features = Vec::with_capacity(tokens.size_hint().0 + 1);
    for token in tokens {
        let invalid = || DataError::InvalidFeature {
            line: line_number,
            token: token.to_string(),
        };
        let (id_part, value_part) = token.split_once(':').ok_or_else(invalid)?;
        let id = lexical_core::parse::<FeatureId>(id_part.as_bytes()).map_err(|_| invalid())?;
        let value = lexical_core::parse::<f64>(value_part.as_bytes()).map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(DataError::NonFiniteValue {
                line: line_number,
                id,
                token: value_part.to_string(),
            });
        }
        features.push(FeatureActivation::new(id, value));
    }
    if let Some(bias) = options.bias_feature {
        features.push(FeatureActivation::new(bias, 1.0));
    }
    Ok(Example::new(features, label))
}

/// Loads every example of a file into memory.
pub fn load_examples(
    path: impl AsRef<Path>,
    options: LoadOptions,
) -> Result<Vec<Example>, DataError> {
    let path = path.as_ref();
    let examples = ExampleReader::open(path, options)?.collect::<Result<Vec<_>, _>>()?;
    log::info!("Loaded {} examples from {}", examples.len(), path.display());
    Ok(examples)
}
