// promptmap/src/record_file.rs
//! JSONL record files as producers: one file, one unit of work.
//!
//! Blank lines are skipped. A malformed line fails the unit; records from
//! earlier lines stay in the tree.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::{
    aggregate::{Emitter, Producer},
    record::Record,
};

#[derive(Clone, Debug)]
pub struct RecordFileProducer {
    pub path: PathBuf,
}

impl RecordFileProducer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Producer for RecordFileProducer {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn produce(&self, emitter: &Emitter<'_>) -> Result<()> {
        let f = File::open(&self.path)
            .with_context(|| format!("open records {}", self.path.display()))?;
        for (i, line) in BufReader::new(f).lines().enumerate() {
            emitter.checkpoint()?;
            let line = line.with_context(|| format!("read jsonl line {}", i + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line)
                .with_context(|| format!("parse jsonl line {}", i + 1))?;
            emitter.emit(record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, CancelToken, CollectingSink};
    use std::fs;

    #[test]
    fn malformed_line_keeps_earlier_records() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jsonl");
        let bad = dir.path().join("bad.jsonl");
        fs::write(
            &good,
            "{\"path\":[\"Proj\",\"A.B\",\"X\"],\"line\":\"Method void M() [public]\"}\n\n",
        )
        .unwrap();
        fs::write(
            &bad,
            "{\"path\":[\"Proj\",\"A.B\",\"Y\"],\"line\":\"Property int N { get; } [public]\"}\nnot json\n",
        )
        .unwrap();

        let agg = Aggregator::new("");
        let sink = CollectingSink::new();
        let producers = vec![RecordFileProducer::new(&good), RecordFileProducer::new(&bad)];
        let stats = agg.run(&producers, &CancelToken::new(), &sink).unwrap();

        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.records, 2);
        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].1.contains("parse jsonl line 2"));

        let root = agg.finish();
        assert_eq!(root.find(&["Proj", "A.B", "X"]).unwrap().line_texts(), vec!["Method void M() [public]"]);
        assert_eq!(
            root.find(&["Proj", "A.B", "Y"]).unwrap().line_texts(),
            vec!["Property int N { get; } [public]"]
        );
    }

    #[test]
    fn missing_file_is_a_producer_failure() {
        let agg = Aggregator::new("");
        let sink = CollectingSink::new();
        let producers = vec![RecordFileProducer::new("/definitely/not/here.jsonl")];
        let stats = agg.run(&producers, &CancelToken::new(), &sink).unwrap();
        assert_eq!(stats.failed, 1);
        assert!(agg.root().is_empty());
    }
}
