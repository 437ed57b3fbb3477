use std::collections::BTreeMap;
use std::path::Path;
use tagsample::config::{CommunityConfig, SampleConfig};
use tagsample::eval::{Evaluation, Round, RoundArgs, FILE_CMM, FILE_IDX, FILE_PTB, FILE_PTB_U, FILE_TGR};
use tagsample::graph::{read_graph, write_graph, DegreeMode, Vertex};
use tagsample::sample::ReportOptions;
use tagsample::store::StoreBackend;
use tagsample::AttrGraph;

fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|x| x.to_string()).collect()
}

fn save<T: serde::Serialize>(path: impl AsRef<Path>, value: &T) {
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

/// Three producers: A and B share d2, C stands alone
fn seed_world(base: &Path) {
    let pd: BTreeMap<&str, Vec<String>> =
        [("A", strings(&["d1", "d2"])), ("B", strings(&["d2", "d3"])), ("C", strings(&["d4"]))].into_iter().collect();
    let dt: BTreeMap<&str, Vec<String>> = [
        ("d1", strings(&["t1", "t2"])),
        ("d2", strings(&["t2", "t3"])),
        ("d3", strings(&["t3", "t4"])),
        ("d4", strings(&["t5"])),
    ]
    .into_iter()
    .collect();
    let tc: BTreeMap<&str, Vec<Vec<String>>> =
        [("t2", vec![strings(&["t1", "t2", "t3"])]), ("t3", vec![strings(&["t2", "t3", "t4"])])].into_iter().collect();
    save(base.join("prod-doc.json"), &pd);
    save(base.join("doc-tag.json"), &dt);
    save(base.join("tag-cluster.json"), &tc);
    save(base.join("group-user.json"), &BTreeMap::<String, Vec<String>>::new());

    let socgr = AttrGraph::from_vertices(["A", "B", "C"].into_iter().map(Vertex::new));
    write_graph(base.join("soc.graph.json.gz"), &socgr).unwrap();
}

fn config() -> SampleConfig {
    SampleConfig {
        store_backend: StoreBackend::JsonSnapshot,
        community: CommunityConfig { edge_betweenness: false, ..Default::default() },
        threads: 2,
        ..Default::default()
    }
}

fn run(ev: &Evaluation, round: Round, args: &RoundArgs) -> String {
    let mut out = Vec::new();
    ev.run(round, args, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn run_through(ev: &Evaluation, last: Round) {
    for round in Round::ALL {
        run(ev, round, &RoundArgs::default());
        if round == last {
            break;
        }
    }
}

#[test]
fn test_generate_world() {
    let dir = tempfile::tempdir().unwrap();
    seed_world(dir.path());
    let ev = Evaluation::new(dir.path(), config()).unwrap();
    run_through(&ev, Round::Generate);

    let prodgr = read_graph(dir.path().join(FILE_IDX)).unwrap();
    assert_eq!(prodgr.vertex_count(), 3);
    let a = prodgr.find("A").unwrap();
    let b = prodgr.find("B").unwrap();
    let c = prodgr.find("C").unwrap();
    let ab = prodgr.find_edge(a, b).unwrap();
    assert!((prodgr.edges()[ab].weight - 0.5).abs() < 1e-12);
    assert_eq!(prodgr.degree(c, DegreeMode::All), 0);

    let comm: Vec<Vec<usize>> = serde_json::from_slice(&std::fs::read(dir.path().join(FILE_CMM)).unwrap()).unwrap();
    let lo = 4f64.ln();
    for cm in &comm {
        assert!(lo <= cm.len() as f64 && cm.len() as f64 <= 3.0 / lo);
    }
    assert!(comm.contains(&vec![a.min(b), a.max(b)]));

    let sprdgr = read_graph(dir.path().join(FILE_TGR)).unwrap();
    assert_eq!(sprdgr.vertex_count(), comm.len());

    let ptabgr = read_graph(dir.path().join(FILE_PTB)).unwrap();
    assert_eq!(ptabgr.attr("base_h"), Some(3));
    assert_eq!(ptabgr.attr("base_g"), Some(3));
    assert_eq!(ptabgr.vertex_count(), 3 + comm.len());
    for u in 0..3 {
        assert!(ptabgr.find_edge(u, u).is_some(), "user {} has no self loop", u);
    }
    assert!(dir.path().join(FILE_PTB_U).exists());
}

#[test]
fn test_generate_resumes() {
    let dir = tempfile::tempdir().unwrap();
    seed_world(dir.path());
    let ev = Evaluation::new(dir.path(), config()).unwrap();
    run_through(&ev, Round::Generate);

    let files = [FILE_IDX, FILE_CMM, FILE_TGR, FILE_PTB, FILE_PTB_U];
    let read_all = || -> Vec<Vec<u8>> { files.iter().map(|f| std::fs::read(dir.path().join(f)).unwrap()).collect() };
    let first = read_all();

    run(&ev, Round::Generate, &RoundArgs::default());
    assert_eq!(read_all(), first);

    std::fs::remove_file(dir.path().join(FILE_IDX)).unwrap();
    run(&ev, Round::Generate, &RoundArgs::default());
    assert_eq!(read_all(), first);
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    seed_world(dir.path());
    let ev = Evaluation::new(dir.path(), config()).unwrap();
    run_through(&ev, Round::Unwrap);

    assert_eq!(std::fs::read_to_string(dir.path().join("doc-tag.len")).unwrap().trim(), "4");
    for nsid in ["A", "B", "C"] {
        assert!(dir.path().join("idx").join(format!("{}.graph.json.gz", nsid)).exists());
        assert!(dir.path().join("idx").join(nsid).join("attributes.json.gz").exists());
        assert!(dir.path().join("idx").join(nsid).join("nodes.json.gz").exists());
    }

    let out = run(&ev, Round::Examine, &RoundArgs::default());
    assert!(out.starts_with("# degree count\n"));
    assert!(out.contains("# id srcout dstin closeness\n"));
    let a_line = out.lines().find(|l| l.starts_with("A ")).unwrap();
    let close: f64 = a_line.split(' ').nth(3).unwrap().parse().unwrap();
    assert!((close - 0.5).abs() < 1e-9, "{}", a_line);
}

#[test]
fn test_examine_report() {
    let dir = tempfile::tempdir().unwrap();
    seed_world(dir.path());
    let ev = Evaluation::new(dir.path(), config()).unwrap();
    run_through(&ev, Round::Generate);

    std::fs::write(dir.path().join("res").join("q1.json"), r#"{"id":"A","tag":"t3","steps":{"8":{"results":["d2"]}}}"#)
        .unwrap();
    let args = RoundArgs { reports: vec!["q1.json".to_string()], report: ReportOptions::default(), skip_lower_than: 0 };
    let out = run(&ev, Round::Examine, &args);

    let mut lines = out.lines();
    assert_eq!(lines.next(), Some("# close steps precision recall f1_score"));
    let nums: Vec<f64> = lines.next().unwrap().split(' ').map(|x| x.parse().unwrap()).collect();
    assert!((nums[0] - 0.75).abs() < 1e-9);
    assert_eq!(nums[1], 8.0);
    assert!((nums[2] - 1.0).abs() < 1e-9);
    assert!((nums[3] - 0.5).abs() < 1e-9);
    assert!((nums[4] - 2.0 / 3.0).abs() < 1e-9);
}
