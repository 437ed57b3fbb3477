//! Inverse lookup stores: doc -> producers from producer -> docs, and
//! tag -> docs from doc -> tags

use super::SampleResult;
use crate::store::KvStore;
use crate::util::{exec_unique, invert_multimap, pending_unique};
use tracing::info;

/// Fill `dst` with the inverse of the multimap `src`.
///
/// Values are listed in the key order of `src`. Keys already in `dst` are
/// left alone, so an interrupted run picks up where it stopped. Returns the
/// number of keys written.
pub fn invert_store(
    src: &dyn KvStore<Vec<String>>,
    dst: &mut dyn KvStore<Vec<String>>,
    stage: &str,
    steps: usize,
) -> SampleResult<usize> {
    let keys = src.keys()?;
    info!("{}: reading {} keys", stage, keys.len());
    let mut pairs = Vec::with_capacity(keys.len());
    for k in keys {
        let vs = src.fetch(&k)?;
        pairs.push((k, vs));
    }
    let inverse = invert_multimap(pairs);

    let pending = pending_unique(inverse.keys().cloned(), |k| dst.contains(k))?;
    let done = exec_unique(
        stage,
        &pending,
        steps,
        |k| -> SampleResult<()> {
            let mut vs = inverse.get(k).cloned().unwrap_or_default();
            vs.dedup();
            dst.set(k, vs)?;
            Ok(())
        },
        |_, _, ()| {},
    )?;
    dst.sync()?;
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|x| x.to_string()).collect()
    }

    fn pddb() -> MemoryStore<Vec<String>> {
        [("A", strings(&["d1", "d2"])), ("B", strings(&["d2", "d3"])), ("C", strings(&["d4"]))].into_iter().collect()
    }

    #[test]
    fn test_invert_store() {
        let src = pddb();
        let mut dst: MemoryStore<Vec<String>> = MemoryStore::new();
        assert_eq!(invert_store(&src, &mut dst, "inv", 4).unwrap(), 4);
        assert_eq!(dst.fetch("d2").unwrap(), strings(&["A", "B"]));
        assert_eq!(dst.fetch("d4").unwrap(), strings(&["C"]));
    }

    #[test]
    fn test_invert_store_resumes() {
        let src = pddb();
        let mut dst: MemoryStore<Vec<String>> = MemoryStore::new();
        dst.set("d1", strings(&["Z"])).unwrap();
        assert_eq!(invert_store(&src, &mut dst, "inv", 4).unwrap(), 3);
        assert_eq!(dst.fetch("d1").unwrap(), strings(&["Z"]));
        assert_eq!(invert_store(&src, &mut dst, "inv", 4).unwrap(), 0);
    }
}
