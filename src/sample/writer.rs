//! Materialization of per-producer graphs
//!
//! Every index and tgraph is written as `<dir>/<nsid>.graph.json.gz`.
//! Unwrapping splits a written graph into `<dir>/<nsid>/`:
//! - `attributes.json.gz`: the bucket mask and the graph attributes
//! - `nodes.json.gz`: the node ids (with their `nat` for tgraphs)
//! - `<bucket>.json.gz`: one entry per node, bucketed by a hash of its id

use super::SampleResult;
use crate::graph::{read_graph, write_graph, write_json_gz, AttrGraph, VertexId, GRAPH_EXT};
use crate::producer::Producer;
use crate::store::KvStore;
use crate::util::{exec_unique, pending_unique};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const UNWRAP_EXT: &str = "json.gz";

/// Bucket entry of an index tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub naa: Option<f64>,
    /// Documents carrying the tag
    pub docs: Vec<String>,
    /// Related producers the tag points at, with arc weight
    pub producers: Vec<(String, f64)>,
}

/// Bucket entry of a tgraph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TGraphEntry {
    pub nat: Option<f64>,
    pub arcs: Vec<(String, f64)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BucketAttributes {
    mask: u64,
    #[serde(flatten)]
    attrs: BTreeMap<String, i64>,
}

/// Path of the graph file of `nsid` under `dir`
pub fn graph_path(dir: &Path, nsid: &str) -> PathBuf {
    dir.join(format!("{}.{}", nsid, GRAPH_EXT))
}

/// Number of hash bits for a graph of `order` vertices
pub fn bucket_bits(order: usize) -> u32 {
    let l = (1.0 + order as f64).ln();
    (l * l / 16.0) as u32
}

/// Bucket name of `id` under `bits` hash bits, as fixed-width hex
pub fn bucket_of(id: &str, bits: u32) -> String {
    let digest = Sha256::digest(id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let mask = mask_of(bits);
    let width = if bits == 0 { 0 } else { ((bits as usize - 1) >> 2) + 1 };
    format!("{:0width$x}", u64::from_be_bytes(head) & mask, width = width)
}

fn mask_of(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

pub struct SampleWriter<'a> {
    phdb: &'a dyn KvStore<Producer>,
    pgdb: &'a dyn KvStore<Producer>,
    totalsize: usize,
    progress_steps: usize,
}

impl<'a> SampleWriter<'a> {
    pub fn new(phdb: &'a dyn KvStore<Producer>, pgdb: &'a dyn KvStore<Producer>, totalsize: usize) -> Self {
        SampleWriter { phdb, pgdb, totalsize, progress_steps: crate::util::PROGRESS_STEPS }
    }

    pub fn with_progress_steps(mut self, steps: usize) -> Self {
        self.progress_steps = steps;
        self
    }

    /// Write the index graph of every base producer without one yet
    pub fn write_indexes(&self, dir: &Path) -> SampleResult<usize> {
        fs::create_dir_all(dir)?;
        let pending = pending_unique(self.phdb.keys()?, |nsid| -> SampleResult<bool> { Ok(graph_path(dir, nsid).exists()) })?;
        let done = exec_unique(
            "indexes db: object files",
            &pending,
            self.progress_steps,
            |nsid| -> SampleResult<()> {
                let prod = self.phdb.fetch(nsid)?;
                write_graph(graph_path(dir, nsid), &prod.create_index())?;
                Ok(())
            },
            |_, _, ()| {},
        )?;
        Ok(done)
    }

    /// Write the tgraph of every community producer without one yet
    pub fn write_tgraphs(&self, dir: &Path) -> SampleResult<usize> {
        fs::create_dir_all(dir)?;
        let pending = pending_unique(self.pgdb.keys()?, |nsid| -> SampleResult<bool> { Ok(graph_path(dir, nsid).exists()) })?;
        let done = exec_unique(
            "tgraphs db: object files",
            &pending,
            self.progress_steps,
            |nsid| -> SampleResult<()> {
                let prod = self.pgdb.fetch(nsid)?;
                write_graph(graph_path(dir, nsid), &prod.create_tgraph(self.totalsize, self.pgdb)?)?;
                Ok(())
            },
            |_, _, ()| {},
        )?;
        Ok(done)
    }

    /// Split a written tgraph into buckets. Every vertex gets an entry.
    pub fn unwrap_tgraph(&self, dir: &Path, gid: &str) -> SampleResult<()> {
        debug!("unwrap tgraph {}: reading", gid);
        let g = read_graph(graph_path(dir, gid))?;
        let nodes: BTreeMap<&str, Option<f64>> = g.vertices().iter().map(|v| (v.id.as_str(), v.nat)).collect();
        unwrap_graph(dir, gid, &g, &nodes, 0..g.vertex_count(), |g, v| TGraphEntry {
            nat: g.vertices()[v].nat,
            arcs: g.out_edges(v).map(|e| (g.vertices()[e.target].id.clone(), e.weight)).collect(),
        })
    }

    /// Split a written index into buckets, one entry per tag.
    ///
    /// Graph files smaller than `skip_lower_than` bytes are left alone;
    /// returns whether the index was unwrapped.
    pub fn unwrap_index(&self, dir: &Path, hid: &str, skip_lower_than: u64) -> SampleResult<bool> {
        debug!("unwrap index {}: reading", hid);
        let path = graph_path(dir, hid);
        let len = fs::metadata(&path)?.len();
        if skip_lower_than > 0 && len < skip_lower_than {
            info!("unwrap index {}: skipping ({} < {})", hid, len, skip_lower_than);
            return Ok(false);
        }

        let h = read_graph(&path)?;
        let base_t = h.base("base_t").unwrap_or(0);
        let base_h = h.base("base_h").unwrap_or(h.vertex_count());
        let nodes: Vec<&str> = h.vertices()[base_t..base_h].iter().map(|v| v.id.as_str()).collect();
        unwrap_graph(dir, hid, &h, &nodes, base_t..base_h, |h, v| {
            let mut entry = IndexEntry { naa: h.vertices()[v].naa, docs: Vec::new(), producers: Vec::new() };
            for e in h.out_edges(v) {
                let id = h.vertices()[e.target].id.clone();
                if e.target < base_t {
                    entry.docs.push(id);
                } else if e.target >= base_h {
                    entry.producers.push((id, e.weight));
                }
            }
            entry
        })?;
        Ok(true)
    }
}

fn unwrap_graph<N, T, F>(dir: &Path, gid: &str, g: &AttrGraph, nodes: &N, vids: std::ops::Range<VertexId>, entry: F) -> SampleResult<()>
where
    N: Serialize + ?Sized,
    T: Serialize,
    F: Fn(&AttrGraph, VertexId) -> T,
{
    let bits = bucket_bits(g.vertex_count());
    let bdir = dir.join(gid);
    fs::create_dir_all(&bdir)?;

    let mut buckets: BTreeMap<String, BTreeMap<&str, T>> = BTreeMap::new();
    for v in vids {
        let id = g.vertices()[v].id.as_str();
        buckets.entry(bucket_of(id, bits)).or_default().insert(id, entry(g, v));
    }

    debug!("unwrap {}: writing {} buckets", gid, buckets.len());
    for (bucket, contents) in &buckets {
        write_json_gz(bdir.join(format!("{}.{}", bucket, UNWRAP_EXT)), contents)?;
    }

    // attributes mark the directory complete, so they go last
    debug!("unwrap {}: writing nodes and attributes", gid);
    write_json_gz(bdir.join(format!("nodes.{}", UNWRAP_EXT)), nodes)?;
    let attributes = BucketAttributes { mask: mask_of(bits), attrs: g.attrs().clone() };
    write_json_gz(bdir.join(format!("attributes.{}", UNWRAP_EXT)), &attributes)?;
    info!("unwrap {}: complete", gid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvergeConfig;
    use crate::graph::read_json_gz;
    use crate::producer::RepConfig;
    use crate::store::MemoryStore;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|x| x.to_string()).collect()
    }

    fn producer(nsid: &str, docs: &[&str], dtdb: &MemoryStore<Vec<String>>) -> Producer {
        let mut prod = Producer::new(nsid);
        prod.init_content(strings(docs), dtdb).unwrap();
        prod.infer_scores(&ConvergeConfig::default()).unwrap();
        prod.rep_doc(&RepConfig::docs()).unwrap();
        prod.rep_tag(&RepConfig::tags()).unwrap();
        prod.init_prod_arcs(Default::default()).unwrap();
        prod
    }

    fn stores() -> MemoryStore<Producer> {
        let dtdb: MemoryStore<Vec<String>> = [
            ("d1", strings(&["t1", "t2"])),
            ("d2", strings(&["t2", "t3"])),
            ("d3", strings(&["t3", "t4"])),
        ]
        .into_iter()
        .collect();
        [("A", producer("A", &["d1", "d2"], &dtdb)), ("B", producer("B", &["d2", "d3"], &dtdb))].into_iter().collect()
    }

    #[test]
    fn test_bucket_naming() {
        assert_eq!(bucket_bits(0), 0);
        assert_eq!(bucket_bits(100), 1);
        assert_eq!(bucket_bits(10_000), 5);
        assert_eq!(bucket_of("t1", 0), "0");
        assert_eq!(bucket_of("t1", 5).len(), 2);
        assert_eq!(bucket_of("t1", 4).len(), 1);
        assert_eq!(bucket_of("t1", 5), bucket_of("t1", 5));
    }

    #[test]
    fn test_write_indexes_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let phdb = stores();
        let pgdb: MemoryStore<Producer> = MemoryStore::new();
        let writer = SampleWriter::new(&phdb, &pgdb, 3);

        assert_eq!(writer.write_indexes(dir.path()).unwrap(), 2);
        assert!(graph_path(dir.path(), "A").exists());
        assert_eq!(writer.write_indexes(dir.path()).unwrap(), 0);

        let h = read_graph(graph_path(dir.path(), "A")).unwrap();
        let index = phdb.fetch("A").unwrap().create_index();
        assert_eq!(h.vertices().iter().map(|v| &v.id).collect::<Vec<_>>(), index.vertices().iter().map(|v| &v.id).collect::<Vec<_>>());
        assert_eq!(h.edge_count(), index.edge_count());
        assert_eq!(h.attrs(), index.attrs());
    }

    #[test]
    fn test_unwrap_index() {
        let dir = tempfile::tempdir().unwrap();
        let phdb = stores();
        let pgdb: MemoryStore<Producer> = MemoryStore::new();
        let writer = SampleWriter::new(&phdb, &pgdb, 3);
        writer.write_indexes(dir.path()).unwrap();

        assert!(!writer.unwrap_index(dir.path(), "A", u64::MAX).unwrap());
        assert!(!dir.path().join("A").exists());

        assert!(writer.unwrap_index(dir.path(), "A", 0).unwrap());
        let bdir = dir.path().join("A");
        let nodes: Vec<String> = read_json_gz(bdir.join("nodes.json.gz")).unwrap();
        assert_eq!(nodes, strings(&["t1", "t2", "t3"]));

        let attrs: serde_json::Value = read_json_gz(bdir.join("attributes.json.gz")).unwrap();
        assert_eq!(attrs["mask"], 0);
        assert_eq!(attrs["base_t"], 2);

        // 5 vertices fit in a single bucket
        let bucket: BTreeMap<String, IndexEntry> = read_json_gz(bdir.join("0.json.gz")).unwrap();
        assert_eq!(bucket.len(), 3);
        assert_eq!(bucket["t2"].docs, strings(&["d1", "d2"]));
        assert!(bucket["t2"].producers.is_empty());
    }

    #[test]
    fn test_interrupted_unwrap_is_not_marked_done() {
        let dir = tempfile::tempdir().unwrap();
        let phdb = stores();
        let pgdb: MemoryStore<Producer> = MemoryStore::new();
        let writer = SampleWriter::new(&phdb, &pgdb, 3);
        writer.write_indexes(dir.path()).unwrap();

        // a directory where the only bucket file should go makes its write fail
        let bdir = dir.path().join("A");
        fs::create_dir_all(bdir.join("0.json.gz")).unwrap();
        assert!(writer.unwrap_index(dir.path(), "A", 0).is_err());
        assert!(!bdir.join("attributes.json.gz").exists());

        fs::remove_dir(bdir.join("0.json.gz")).unwrap();
        assert!(writer.unwrap_index(dir.path(), "A", 0).unwrap());
        assert!(bdir.join("attributes.json.gz").exists());
        assert!(bdir.join("0.json.gz").is_file());
    }
}
