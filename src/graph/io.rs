//! Graph and map files
//!
//! Graphs are written as gzip-compressed JSON node-link documents; small maps
//! (group memberships, communities, routing maps) as plain JSON.

use super::store::{AttrGraph, GraphResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name extension of written graphs
pub const GRAPH_EXT: &str = "graph.json.gz";

/// Write through a temporary sibling, renamed over `path` only once complete.
///
/// Stages treat an existing file as done, so a partly written one must never
/// appear under the final name.
fn write_atomic<F>(path: &Path, write: F) -> GraphResult<()>
where
    F: FnOnce(BufWriter<File>) -> GraphResult<()>,
{
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let result = File::create(&tmp)
        .map_err(Into::into)
        .and_then(|file| write(BufWriter::new(file)))
        .and_then(|()| fs::rename(&tmp, path).map_err(Into::into));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Write any serializable value as gzip-compressed JSON
pub fn write_json_gz<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> GraphResult<()> {
    write_atomic(path.as_ref(), |w| {
        let mut enc = GzEncoder::new(w, Compression::default());
        serde_json::to_writer(&mut enc, value)?;
        enc.finish()?.flush()?;
        Ok(())
    })
}

pub fn read_json_gz<T: DeserializeOwned>(path: impl AsRef<Path>) -> GraphResult<T> {
    let file = File::open(path.as_ref())?;
    let dec = GzDecoder::new(BufReader::new(file));
    Ok(serde_json::from_reader(dec)?)
}

pub fn write_graph(path: impl AsRef<Path>, g: &AttrGraph) -> GraphResult<()> {
    debug!("writing graph of {} vertices to {}", g.vertex_count(), path.as_ref().display());
    write_json_gz(path, g)
}

pub fn read_graph(path: impl AsRef<Path>) -> GraphResult<AttrGraph> {
    debug!("reading graph from {}", path.as_ref().display());
    read_json_gz(path)
}

/// Save a map (or any value) as pretty JSON
pub fn save_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> GraphResult<()> {
    write_atomic(path.as_ref(), |mut w| {
        serde_json::to_writer_pretty(&mut w, value)?;
        w.flush()?;
        Ok(())
    })
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> GraphResult<T> {
    let file = File::open(path.as_ref())?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
