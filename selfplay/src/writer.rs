//! Chunked binary sample writer.
//!
//! Samples stream into fixed-size chunks; every chunk is a triple of raw
//! little-endian arrays plus a JSON sidecar with the sample count:
//!
//! - `chunk_<k>_X.bin`: f32, `[samples, TENSOR_LEN]`, the encoded positions
//! - `chunk_<k>_P.bin`: f32, `[samples, 81]`, normalised visit policies
//! - `chunk_<k>_Z.bin`: i8, `[samples]`, game outcomes in `{-1, 0, +1}`
//! - `chunk_<k>_meta.json`: `{"samples": N}`
//!
//! All three binary files of a chunk share the same leading sample count.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use serde_json::json;
use thiserror::Error;
use tracing::info;

use hexxagon_core::{CellState, TENSOR_LEN};
use hexxagon_mcts::VISIT_SLOTS;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("meta serialization failed: {0}")]
    Meta(#[from] serde_json::Error),
}

/// One position record before the outcome is known.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub state: [f32; TENSOR_LEN],
    pub policy: [f32; VISIT_SLOTS],
    pub side: CellState,
}

/// A finished training sample.
#[derive(Debug, Clone)]
pub struct Sample {
    pub state: [f32; TENSOR_LEN],
    pub policy: [f32; VISIT_SLOTS],
    pub value: i8,
}

struct ChunkFiles {
    x: BufWriter<File>,
    p: BufWriter<File>,
    z: BufWriter<File>,
}

/// Rotating writer; see the module docs for the on-disk layout.
pub struct ChunkWriter {
    out_dir: PathBuf,
    chunk_size: usize,
    idx: usize,
    count: usize,
    files: Option<ChunkFiles>,
}

impl ChunkWriter {
    pub fn new(out_dir: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            chunk_size: chunk_size.max(1),
            idx: 0,
            count: 0,
            files: None,
        }
    }

    fn base_name(&self) -> String {
        format!("chunk_{:05}", self.idx)
    }

    fn write_meta(&self) -> Result<(), WriterError> {
        let meta = json!({ "samples": self.count });
        let path = self.out_dir.join(format!("{}_meta.json", self.base_name()));
        std::fs::write(path, serde_json::to_vec_pretty(&meta)?)?;
        Ok(())
    }

    /// Seal the current chunk (if any) and open the next one.
    fn rotate(&mut self) -> Result<(), WriterError> {
        if let Some(mut files) = self.files.take() {
            files.x.flush()?;
            files.p.flush()?;
            files.z.flush()?;
            self.write_meta()?;
            info!(chunk = self.base_name(), samples = self.count, "chunk sealed");
        }
        self.idx += 1;
        self.count = 0;
        let open = |suffix: &str| -> Result<BufWriter<File>, WriterError> {
            let path = self
                .out_dir
                .join(format!("{}_{suffix}.bin", self.base_name()));
            Ok(BufWriter::new(File::create(path)?))
        };
        self.files = Some(ChunkFiles {
            x: open("X")?,
            p: open("P")?,
            z: open("Z")?,
        });
        Ok(())
    }

    pub fn write_sample(&mut self, s: &Sample) -> Result<(), WriterError> {
        if self.files.is_none() || self.count >= self.chunk_size {
            self.rotate()?;
        }
        let Some(files) = self.files.as_mut() else {
            return Err(WriterError::Io(io::Error::other("chunk files not open")));
        };
        for v in &s.state {
            files.x.write_all(&v.to_le_bytes())?;
        }
        for v in &s.policy {
            files.p.write_all(&v.to_le_bytes())?;
        }
        files.z.write_all(&[s.value as u8])?;
        self.count += 1;
        Ok(())
    }

    /// Flush and seal the trailing partial chunk.
    pub fn finish(mut self) -> Result<(), WriterError> {
        if let Some(mut files) = self.files.take() {
            files.x.flush()?;
            files.p.flush()?;
            files.z.flush()?;
            if self.count > 0 {
                self.write_meta()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: i8) -> Sample {
        Sample {
            state: [0.5; TENSOR_LEN],
            policy: [1.0 / VISIT_SLOTS as f32; VISIT_SLOTS],
            value,
        }
    }

    #[test]
    fn chunk_rotation_and_sizes() {
        // Chunk size C, C+1 samples: two chunks holding C and 1.
        let dir = tempfile::tempdir().unwrap();
        let c = 4usize;
        let mut w = ChunkWriter::new(dir.path(), c);
        for i in 0..=c {
            w.write_sample(&sample(if i % 2 == 0 { 1 } else { -1 })).unwrap();
        }
        w.finish().unwrap();

        let meta1: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("chunk_00001_meta.json")).unwrap(),
        )
        .unwrap();
        let meta2: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("chunk_00002_meta.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta1["samples"], c);
        assert_eq!(meta2["samples"], 1);

        let len = |name: &str| std::fs::metadata(dir.path().join(name)).unwrap().len() as usize;
        assert_eq!(len("chunk_00001_X.bin"), c * TENSOR_LEN * 4);
        assert_eq!(len("chunk_00001_P.bin"), c * VISIT_SLOTS * 4);
        assert_eq!(len("chunk_00001_Z.bin"), c);
        assert_eq!(len("chunk_00002_X.bin"), TENSOR_LEN * 4);
        assert_eq!(len("chunk_00002_P.bin"), VISIT_SLOTS * 4);
        assert_eq!(len("chunk_00002_Z.bin"), 1);
    }

    #[test]
    fn values_round_trip_as_signed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = ChunkWriter::new(dir.path(), 16);
        for v in [-1i8, 0, 1] {
            w.write_sample(&sample(v)).unwrap();
        }
        w.finish().unwrap();

        let z = std::fs::read(dir.path().join("chunk_00001_Z.bin")).unwrap();
        assert_eq!(z.len(), 3);
        assert_eq!(z[0] as i8, -1);
        assert_eq!(z[1] as i8, 0);
        assert_eq!(z[2] as i8, 1);
    }

    #[test]
    fn empty_writer_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let w = ChunkWriter::new(dir.path(), 8);
        w.finish().unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
