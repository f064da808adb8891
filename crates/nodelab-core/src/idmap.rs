//! Original node ID -> dense integer index.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Dense index assigned to nodes in the order they are scanned.
///
/// The map keeps every scanned row (`entries`) so that the persisted side
/// file mirrors the input exactly, including repeated IDs. A repeated ID is
/// re-pointed at its newest index; the counter never rewinds, so indices of
/// overwritten rows are simply left unused.
#[derive(Debug, Clone, Default)]
pub struct NodeIdMap {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl NodeIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next index to `id` and return it.
    pub fn assign(&mut self, id: impl Into<String>) -> usize {
        let id = id.into();
        let next = self.entries.len();
        if let Some(prev) = self.index.insert(id.clone(), next) {
            tracing::warn!(node = %id, prev, next, "duplicate node id, remapping");
        }
        self.entries.push((id, next));
        next
    }

    /// Build from a node-content source: the first token of each line is the node ID.
    pub fn from_content_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut map = Self::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(id) = line.split_whitespace().next() {
                map.assign(id);
            }
        }
        Ok(map)
    }

    pub fn from_content_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_content_reader(BufReader::new(file))
    }

    /// Lookup without failing.
    pub fn get(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Lookup that treats a miss as fatal.
    pub fn resolve(&self, id: &str) -> Result<usize> {
        self.get(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// Number of distinct IDs.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Every scanned `(id, index)` pair, in scan order.
    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// Persist as `id index` lines.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for (id, idx) in &self.entries {
            writeln!(out, "{id} {idx}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Load a side file written by [`NodeIdMap::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut map = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let (Some(id), Some(idx), None) = (parts.next(), parts.next(), parts.next()) else {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(Error::parse(path, lineno + 1, "expected `id index`"));
            };
            let idx: usize = idx
                .parse()
                .map_err(|_| Error::parse(path, lineno + 1, format!("bad index `{idx}`")))?;
            map.index.insert(id.to_string(), idx);
            map.entries.push((id.to_string(), idx));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_scan_order() {
        let content = "31336 0 1 0 Neural_Networks\n1061127 1 0 0 Rule_Learning\n1106406 0 0 1 Theory\n";
        let map = NodeIdMap::from_content_reader(Cursor::new(content)).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("31336"), Some(0));
        assert_eq!(map.get("1061127"), Some(1));
        assert_eq!(map.get("1106406"), Some(2));
    }

    #[test]
    fn test_duplicate_overwrites() {
        let map = NodeIdMap::from_content_reader(Cursor::new("a\nb\na\n")).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(2));
        assert_eq!(map.entries().len(), 3);
    }

    #[test]
    fn test_resolve_miss_is_error() {
        let map = NodeIdMap::from_content_reader(Cursor::new("a\n")).unwrap();
        assert!(matches!(map.resolve("zzz"), Err(Error::UnknownNode(id)) if id == "zzz"));
    }

    #[test]
    fn test_side_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.file");

        let map = NodeIdMap::from_content_reader(Cursor::new("x\ny\n")).unwrap();
        map.write_to(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x 0\ny 1\n");
        let loaded = NodeIdMap::read_from(&path).unwrap();
        assert_eq!(loaded.get("y"), Some(1));
    }
}
