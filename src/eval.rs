//! Pipeline rounds over a base directory
//!
//! Each round reads the artifacts of the rounds it depends on from the base
//! directory and writes its own next to them. Rounds are resumable: work whose
//! output is already on disk is not redone.

use crate::config::SampleConfig;
use crate::graph::{load_json, read_graph, save_json, write_graph, DegreeMode};
use crate::producer::{Producer, ProducerState};
use crate::sample::{
    invert_store, DynStore, ProducerDbs, QueryReport, ReportOptions, SampleError, SampleGenerator, SampleResult,
    SampleStats, SampleWriter, SourceDbs, WorldDbs,
};
use crate::store::{open_store, CachedStore, KvStore};
use crate::util::{exec_unique, pending_unique, PoolExecutor};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

pub const FILE_SOC: &str = "soc.graph.json.gz";
pub const FILE_GU: &str = "group-user.json";
pub const FILE_DT_LEN: &str = "doc-tag.len";
pub const FILE_IDX: &str = "idx.graph.json.gz";
pub const FILE_CMM: &str = "communities.json";
pub const FILE_TGR: &str = "tgr.graph.json.gz";
pub const FILE_PTB: &str = "ptb.graph.json.gz";
pub const FILE_PTB_U: &str = "ptables.json";

/// A pipeline round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    InvPd,
    InvDt,
    Generate,
    WriteAll,
    Unwrap,
    Examine,
}

/// What a round needs and what it leaves behind
#[derive(Debug, Clone, Copy)]
pub struct RoundInfo {
    pub desc: &'static str,
    pub deps: &'static [Round],
    pub out: &'static [&'static str],
}

impl Round {
    pub const ALL: [Round; 6] = [Round::InvPd, Round::InvDt, Round::Generate, Round::WriteAll, Round::Unwrap, Round::Examine];

    pub fn name(&self) -> &'static str {
        match self {
            Round::InvPd => "inv_pd",
            Round::InvDt => "inv_dt",
            Round::Generate => "generate",
            Round::WriteAll => "writeall",
            Round::Unwrap => "unwrap",
            Round::Examine => "examine",
        }
    }

    pub fn info(&self) -> RoundInfo {
        match self {
            Round::InvPd => RoundInfo { desc: "Inverting producer-document mapping", deps: &[], out: &["doc-prod"] },
            Round::InvDt => RoundInfo { desc: "Inverting document-tag mapping", deps: &[], out: &["tag-doc", FILE_DT_LEN] },
            Round::Generate => RoundInfo {
                desc: "Generating data",
                deps: &[Round::InvPd],
                out: &["p_idx", "p_idx_s", FILE_IDX, FILE_CMM, "p_tgr", "p_tgr_s", FILE_TGR, FILE_PTB, FILE_PTB_U],
            },
            Round::WriteAll => RoundInfo { desc: "Writing objects", deps: &[Round::Generate, Round::InvDt], out: &["idx/", "tgr/"] },
            Round::Unwrap => RoundInfo { desc: "Unwrapping objects into buckets", deps: &[Round::WriteAll], out: &["idx/*/", "tgr/*/"] },
            Round::Examine => RoundInfo { desc: "Examining data", deps: &[Round::Generate, Round::InvDt], out: &[] },
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Round {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Round::ALL.into_iter().find(|r| r.name() == s).ok_or_else(|| {
            let names: Vec<&str> = Round::ALL.iter().map(Round::name).collect();
            format!("unknown round {}; expected one of: {}", s, names.join(", "))
        })
    }
}

/// Per-run arguments of the rounds that take any
#[derive(Debug, Clone, Default)]
pub struct RoundArgs {
    /// Report files under `res/` to examine
    pub reports: Vec<String>,
    pub report: ReportOptions,
    /// Index graph files smaller than this many bytes are not unwrapped
    pub skip_lower_than: u64,
}

pub struct Evaluation {
    base: PathBuf,
    config: SampleConfig,
    dir_idx: PathBuf,
    dir_tgr: PathBuf,
    dir_res: PathBuf,
}

impl Evaluation {
    pub fn new(base: impl Into<PathBuf>, config: SampleConfig) -> SampleResult<Self> {
        let base = base.into();
        if !base.is_dir() {
            return Err(SampleError::NotADirectory(base));
        }
        let dir_idx = base.join("idx");
        let dir_tgr = base.join("tgr");
        let dir_res = base.join("res");
        for dir in [&dir_idx, &dir_tgr, &dir_res] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Evaluation { base, config, dir_idx, dir_tgr, dir_res })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Paths under the base directory the round writes to
    pub fn outputs(&self, round: Round) -> Vec<PathBuf> {
        round.info().out.iter().map(|o| self.base.join(o)).collect()
    }

    pub fn run(&self, round: Round, args: &RoundArgs, out: &mut dyn Write) -> SampleResult<()> {
        let t = Instant::now();
        info!("{}", round.info().desc);
        match round {
            Round::InvPd => self.round_inv_pd()?,
            Round::InvDt => self.round_inv_dt()?,
            Round::Generate => self.round_generate()?,
            Round::WriteAll => self.round_writeall()?,
            Round::Unwrap => self.round_unwrap(args.skip_lower_than)?,
            Round::Examine => self.round_examine(&args.reports, args.report, out)?,
        }
        info!("Round \"{}\" completed in {:.4}s", round, t.elapsed().as_secs_f64());
        Ok(())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    fn db<V>(&self, name: &str) -> SampleResult<DynStore<V>>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        Ok(Box::new(open_store::<V>(&self.base, name, self.config.store_backend)?))
    }

    /// Like [`Self::db`], with the configured read cache in front
    fn cached_db<V>(&self, name: &str) -> SampleResult<DynStore<V>>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let store = open_store::<V>(&self.base, name, self.config.store_backend)?;
        Ok(match NonZeroUsize::new(self.config.cache_size) {
            Some(cap) => Box::new(CachedStore::new(store, cap)),
            None => Box::new(store),
        })
    }

    fn totalsize(&self) -> SampleResult<usize> {
        let text = std::fs::read_to_string(self.path(FILE_DT_LEN))?;
        text.trim()
            .parse()
            .map_err(|e| SampleError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{}: {}", FILE_DT_LEN, e))))
    }

    fn round_inv_pd(&self) -> SampleResult<()> {
        let pddb = self.db::<Vec<String>>("prod-doc")?;
        let mut dppb = self.db::<Vec<String>>("doc-prod")?;
        invert_store(&*pddb, &mut *dppb, "doc-prod", self.config.progress_steps)?;
        Ok(())
    }

    fn round_inv_dt(&self) -> SampleResult<()> {
        let dtdb = self.db::<Vec<String>>("doc-tag")?;
        let mut tddb = self.db::<Vec<String>>("tag-doc")?;
        invert_store(&*dtdb, &mut *tddb, "tag-doc", self.config.progress_steps)?;

        let len = self.path(FILE_DT_LEN);
        if !len.exists() {
            std::fs::write(&len, format!("{}\n", dtdb.len()?))?;
        }
        Ok(())
    }

    fn round_generate(&self) -> SampleResult<()> {
        let socgr = read_graph(self.path(FILE_SOC))?;
        let gumap: IndexMap<String, Vec<String>> = load_json(self.path(FILE_GU))?;

        let src = SourceDbs {
            pddb: self.db("prod-doc")?,
            dppb: self.db("doc-prod")?,
            dtdb: self.db("doc-tag")?,
            tcdb: self.db("tag-cluster")?,
        };
        let idx = ProducerDbs { prods: self.cached_db::<Producer>("p_idx")?, states: self.db::<ProducerState>("p_idx_s")? };
        let tgr = ProducerDbs { prods: self.cached_db::<Producer>("p_tgr")?, states: self.db::<ProducerState>("p_tgr_s")? };
        let mut sg = SampleGenerator::new(self.config.clone(), socgr, gumap, src, idx, tgr);

        if self.path(FILE_IDX).exists() {
            sg.prodgr = Some(read_graph(self.path(FILE_IDX))?);
        } else {
            sg.generate_indexes()?;
            if let Some(g) = &sg.prodgr {
                write_graph(self.path(FILE_IDX), g)?;
            }
        }

        if self.path(FILE_CMM).exists() {
            sg.comm = Some(load_json(self.path(FILE_CMM))?);
        } else {
            let comm = sg.generate_communities()?;
            save_json(self.path(FILE_CMM), comm)?;
        }

        if self.path(FILE_TGR).exists() {
            sg.sprdgr = Some(read_graph(self.path(FILE_TGR))?);
        } else {
            sg.generate_tgraphs()?;
            if let Some(g) = &sg.sprdgr {
                write_graph(self.path(FILE_TGR), g)?;
            }
        }

        if self.path(FILE_PTB).exists() {
            sg.ptabgr = Some(read_graph(self.path(FILE_PTB))?);
            sg.ptbmap = Some(load_json(self.path(FILE_PTB_U))?);
        } else {
            sg.generate_ptables()?;
            if let (Some(g), Some(m)) = (&sg.ptabgr, &sg.ptbmap) {
                write_graph(self.path(FILE_PTB), g)?;
                save_json(self.path(FILE_PTB_U), m)?;
            }
        }

        info!("generation complete; run writeall next");
        Ok(())
    }

    fn round_writeall(&self) -> SampleResult<()> {
        let totalsize = self.totalsize()?;
        let phdb = self.db::<Producer>("p_idx")?;
        let pgdb = self.db::<Producer>("p_tgr")?;

        let writer = SampleWriter::new(&*phdb, &*pgdb, totalsize).with_progress_steps(self.config.progress_steps);
        writer.write_indexes(&self.dir_idx)?;
        writer.write_tgraphs(&self.dir_tgr)?;
        Ok(())
    }

    fn round_unwrap(&self, skip_lower_than: u64) -> SampleResult<()> {
        let totalsize = self.totalsize()?;
        let phdb = self.db::<Producer>("p_idx")?;
        let pgdb = self.db::<Producer>("p_tgr")?;
        let writer = SampleWriter::new(&*phdb, &*pgdb, totalsize);
        let unwrapped = |dir: &Path, nsid: &str| dir.join(nsid).join("attributes.json.gz").exists();

        let pending = pending_unique(phdb.keys()?, |nsid| -> SampleResult<bool> { Ok(unwrapped(&self.dir_idx, nsid)) })?;
        exec_unique(
            "indexes db: buckets",
            &pending,
            self.config.progress_steps,
            |nsid| writer.unwrap_index(&self.dir_idx, nsid, skip_lower_than),
            |_, _, _| {},
        )?;

        let pending = pending_unique(pgdb.keys()?, |nsid| -> SampleResult<bool> { Ok(unwrapped(&self.dir_tgr, nsid)) })?;
        exec_unique(
            "tgraphs db: buckets",
            &pending,
            self.config.progress_steps,
            |nsid| writer.unwrap_tgraph(&self.dir_tgr, nsid),
            |_, _, ()| {},
        )?;
        Ok(())
    }

    /// Statistics over the generated sample.
    ///
    /// With report files, prints their scores; without, prints the degree
    /// distribution of the producer graph and every user's closeness to it.
    fn round_examine(&self, reports: &[String], opts: ReportOptions, out: &mut dyn Write) -> SampleResult<()> {
        let dbs = WorldDbs {
            pddb: self.db("prod-doc")?,
            dppb: self.db("doc-prod")?,
            dtdb: self.db("doc-tag")?,
            tddb: self.db("tag-doc")?,
        };
        let ptabgr = read_graph(self.path(FILE_PTB))?;
        let prodgr = read_graph(self.path(FILE_IDX))?;
        let sprdgr = read_graph(self.path(FILE_TGR))?;
        let stats = SampleStats::new(dbs, self.totalsize()?, ptabgr, prodgr, sprdgr, self.config.closeness);

        if !reports.is_empty() {
            let reports = reports
                .iter()
                .map(|name| QueryReport::load(self.dir_res.join(name)))
                .collect::<Result<Vec<_>, _>>()?;
            return stats.print_reports(&reports, opts, out);
        }

        writeln!(out, "# degree count")?;
        for (k, v) in SampleStats::degree_distribution(stats.prodgr(), DegreeMode::All) {
            writeln!(out, "{} {}", k, v)?;
        }

        let exec = PoolExecutor::new(self.config.threads).map_err(|e| SampleError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let close: BTreeMap<String, _> = stats.all_closeness(&exec)?;
        writeln!(out, "# id srcout dstin closeness")?;
        for (id, c) in close {
            writeln!(out, "{} {} {} {}", id, c.srcout, c.dstin, c.score(self.config.closeness))?;
        }
        Ok(())
    }
}
