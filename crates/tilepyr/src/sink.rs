//! Tile persistence.
//!
//! The run only talks to [`TileSink`]; two implementations exist:
//!
//! - [`DirectorySink`]: `<root>/<zoom>/<column>/<row>.<ext>`, side documents
//!   at their relative paths and `metadata.json`, rewritten on every
//!   metadata entry so it is in place before the first tile.
//! - [`MbtilesSink`]: a single SQLite file with a `tiles` and a `metadata`
//!   table. Every insert is its own commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use rusqlite::{params, Connection};

use crate::error::{PyramidError, Result};
use crate::pyramid::TileCoord;

pub trait TileSink {
    fn put(&mut self, coord: TileCoord, data: &[u8]) -> Result<()>;

    fn put_metadata(&mut self, name: &str, value: &str) -> Result<()>;

    /// Store a side document (HTML/XML/KML) at a `/`-separated relative path.
    fn put_document(&mut self, _path: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    /// Whether [`TileSink::put_document`] keeps anything.
    fn accepts_documents(&self) -> bool {
        false
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: TileSink + ?Sized> TileSink for Box<S> {
    fn put(&mut self, coord: TileCoord, data: &[u8]) -> Result<()> {
        (**self).put(coord, data)
    }

    fn put_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        (**self).put_metadata(name, value)
    }

    fn put_document(&mut self, path: &str, body: &str) -> Result<()> {
        (**self).put_document(path, body)
    }

    fn accepts_documents(&self) -> bool {
        (**self).accepts_documents()
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

pub struct DirectorySink {
    root: PathBuf,
    extension: &'static str,
    metadata: BTreeMap<String, String>,
}

impl DirectorySink {
    /// An existing directory is reused; tiles already in it are overwritten.
    pub fn create<P: AsRef<Path>>(root: P, extension: &'static str) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            extension,
            metadata: BTreeMap::new(),
        })
    }

    pub fn tile_path(&self, coord: TileCoord) -> PathBuf {
        self.root
            .join(coord.zoom.to_string())
            .join(coord.column.to_string())
            .join(format!("{}.{}", coord.row, self.extension))
    }
}

impl TileSink for DirectorySink {
    fn put(&mut self, coord: TileCoord, data: &[u8]) -> Result<()> {
        let path = self.tile_path(coord);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, data)?;
        Ok(())
    }

    fn put_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        self.metadata.insert(name.to_owned(), value.to_owned());

        let json = serde_json::to_string_pretty(&self.metadata)?;
        fs::write(self.root.join("metadata.json"), json)?;
        Ok(())
    }

    fn put_document(&mut self, path: &str, body: &str) -> Result<()> {
        let path = path.split('/').fold(self.root.clone(), |acc, part| acc.join(part));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("writing {}", path.display());
        fs::write(&path, body)?;
        Ok(())
    }

    fn accepts_documents(&self) -> bool {
        true
    }
}

const MBTILES_SCHEMA: &str = r#"
    CREATE TABLE tiles (
        zoom_level INTEGER,
        tile_column INTEGER,
        tile_row INTEGER,
        tile_data BLOB
    );
    CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);
    CREATE TABLE metadata (name TEXT, value TEXT);
    CREATE UNIQUE INDEX name ON metadata (name);
"#;

pub struct MbtilesSink {
    conn: Connection,
}

impl MbtilesSink {
    /// Fails with [`PyramidError::AlreadyExists`] if `path` is already present.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(PyramidError::AlreadyExists(path));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch(MBTILES_SCHEMA)?;
        debug!("created mbtiles container {}", path.display());

        Ok(Self { conn })
    }
}

impl TileSink for MbtilesSink {
    fn put(&mut self, coord: TileCoord, data: &[u8]) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![coord.zoom, coord.column, coord.row, data])?;
        Ok(())
    }

    fn put_metadata(&mut self, name: &str, value: &str) -> Result<()> {
        self.conn
            .prepare_cached("INSERT INTO metadata (name, value) VALUES (?1, ?2)")?
            .execute(params![name, value])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_layout_and_metadata_json() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");

        let mut sink = DirectorySink::create(&root, "png").unwrap();
        sink.put(TileCoord::new(2, 1, 3), b"tile").unwrap();
        sink.put_metadata("name", "scan").unwrap();
        sink.put_document("0/0/0.kml", "<kml/>").unwrap();
        sink.finish().unwrap();

        assert_eq!(fs::read(root.join("2/1/3.png")).unwrap(), b"tile");
        assert_eq!(fs::read_to_string(root.join("0/0/0.kml")).unwrap(), "<kml/>");

        let meta: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(root.join("metadata.json")).unwrap()).unwrap();
        assert_eq!(meta.get("name").map(String::as_str), Some("scan"));
    }

    #[test]
    fn metadata_json_is_written_before_any_tile() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::create(dir.path(), "png").unwrap();

        sink.put_metadata("name", "scan").unwrap();
        sink.put_metadata("type", "overlay").unwrap();

        let meta: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("metadata.json")).unwrap()).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["type"], "overlay");
    }

    #[test]
    fn directory_sink_reuses_existing_tree() {
        let dir = tempfile::tempdir().unwrap();

        DirectorySink::create(dir.path(), "jpg").unwrap();
        let sink = DirectorySink::create(dir.path(), "jpg").unwrap();

        assert_eq!(sink.tile_path(TileCoord::new(0, 0, 0)), dir.path().join("0/0/0.jpg"));
    }

    #[test]
    fn mbtiles_stores_tiles_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mbtiles");

        {
            let mut sink = MbtilesSink::create(&path).unwrap();
            assert!(!sink.accepts_documents());

            sink.put_metadata("name", "scan").unwrap();
            sink.put_metadata("type", "overlay").unwrap();
            sink.put(TileCoord::new(1, 0, 1), &[1, 2, 3]).unwrap();
            sink.put(TileCoord::new(0, 0, 0), &[4]).unwrap();
            sink.finish().unwrap();
        }

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);

        let data: Vec<u8> = conn
            .query_row(
                "SELECT tile_data FROM tiles WHERE zoom_level = 1 AND tile_column = 0 AND tile_row = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(data, vec![1, 2, 3]);

        let kind: String = conn
            .query_row("SELECT value FROM metadata WHERE name = 'type'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(kind, "overlay");
    }

    #[test]
    fn mbtiles_refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken.mbtiles");
        fs::write(&path, b"not a database").unwrap();

        let err = MbtilesSink::create(&path).err().unwrap();
        assert!(matches!(err, PyramidError::AlreadyExists(p) if p == path));
        assert_eq!(fs::read(&path).unwrap(), b"not a database");
    }

    #[test]
    fn mbtiles_rejects_duplicate_tile() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MbtilesSink::create(dir.path().join("dup.mbtiles")).unwrap();

        sink.put(TileCoord::new(0, 0, 0), &[1]).unwrap();
        assert!(matches!(
            sink.put(TileCoord::new(0, 0, 0), &[2]),
            Err(PyramidError::Sqlite(_))
        ));
    }
}
