//! Fragment directories on disk
//!
//! A fragment is a directory `<array_dir>/__<id>/` holding the attribute tile
//! files (written by the caller) and one metadata file with the book-keeping
//! catalog. The metadata file is what makes a fragment visible: it is written
//! under a pending name and renamed into place on commit, so readers never see
//! a half-written catalog.

use crate::book_keeping::BookKeeping;
use crate::config::CatalogConfig;
use crate::error::{FragmentError, Result};
use crate::range::{DomainLayout, SpatialRange};
use crate::uuid::{generate_fragment_id, Clock, FragmentId, UuidGenerator};
use crate::validation::{extract_fragment_id, fragment_dir_name};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the metadata file inside a fragment directory
pub const BOOK_KEEPING_FILE: &str = "__book_keeping.bk";

const PENDING_BOOK_KEEPING_FILE: &str = "__book_keeping.bk.pending";

/// A file that is deleted on drop unless it has been persisted
struct PendingFile {
    path: PathBuf,
    armed: bool,
}

impl PendingFile {
    fn create(path: PathBuf) -> Result<(Self, File)> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok((PendingFile { path, armed: true }, file))
    }

    fn persist(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target)?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to remove pending metadata {:?}: {}", self.path, e);
            }
        }
    }
}

/// Rename the pending file into place and make the rename durable
///
/// If the directory sync fails the renamed file is removed again, so a
/// failed commit never leaves a visible fragment behind.
fn publish<F>(pending: PendingFile, final_path: &Path, dir: &Path, sync: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    pending.persist(final_path)?;

    if let Err(e) = sync(dir) {
        if let Err(remove_err) = fs::remove_file(final_path) {
            warn!(
                "Failed to withdraw metadata {:?} after sync error: {}",
                final_path, remove_err
            );
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Write side of one fragment
///
/// # Examples
///
/// ```rust,no_run
/// use fragment_catalog::{CatalogConfig, Datatype, DomainLayout, FragmentWriter, SpatialRange};
///
/// # fn main() -> fragment_catalog::Result<()> {
/// let layout = DomainLayout::new(Datatype::Int64, 1);
/// let range = SpatialRange::from_pairs(&[(0i64, 10i64)]);
/// let config = CatalogConfig::default();
/// let mut writer = FragmentWriter::create("my_array", &layout, 2, range, config)?;
///
/// writer.append_tile(0, 4096)?;
/// writer.append_tile(1, 512)?;
///
/// let id = writer.commit()?;
/// println!("committed fragment {}", id);
/// # Ok(())
/// # }
/// ```
pub struct FragmentWriter {
    id: FragmentId,
    dir: PathBuf,
    catalog: BookKeeping,
    config: CatalogConfig,
    committed: bool,
}

impl FragmentWriter {
    /// Start a fragment named by the process-wide generator
    pub fn create<P: AsRef<Path>>(
        array_dir: P,
        layout: &DomainLayout,
        attribute_count: usize,
        range: SpatialRange,
        config: CatalogConfig,
    ) -> Result<Self> {
        let id = generate_fragment_id()?;
        Self::create_with_id(array_dir, id, layout, attribute_count, range, config)
    }

    /// Start a fragment named by a caller-owned generator
    pub fn create_with_generator<P: AsRef<Path>, C: Clock>(
        array_dir: P,
        generator: &UuidGenerator<C>,
        layout: &DomainLayout,
        attribute_count: usize,
        range: SpatialRange,
        config: CatalogConfig,
    ) -> Result<Self> {
        let id = generator.generate()?;
        Self::create_with_id(array_dir, id, layout, attribute_count, range, config)
    }

    /// Start a fragment with an explicit id
    pub fn create_with_id<P: AsRef<Path>>(
        array_dir: P,
        id: FragmentId,
        layout: &DomainLayout,
        attribute_count: usize,
        range: SpatialRange,
        config: CatalogConfig,
    ) -> Result<Self> {
        config.validate()?;
        layout.validate(&range)?;

        let mut catalog = BookKeeping::new();
        catalog.init(attribute_count, range)?;

        let array_dir = array_dir.as_ref();
        fs::create_dir_all(array_dir)?;
        let dir = array_dir.join(fragment_dir_name(&id));
        fs::create_dir(&dir)?;

        info!("Created fragment {} in {:?}", id, array_dir);

        Ok(FragmentWriter {
            id,
            dir,
            catalog,
            config,
            committed: false,
        })
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    /// Directory the caller writes attribute tiles into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &BookKeeping {
        &self.catalog
    }

    /// See [`BookKeeping::append_tile_offset`]
    pub fn append_tile_offset(&mut self, attribute: usize, offset: u64) -> Result<()> {
        self.catalog.append_tile_offset(attribute, offset)
    }

    /// See [`BookKeeping::append_tile`]
    pub fn append_tile(&mut self, attribute: usize, tile_size: u64) -> Result<u64> {
        self.catalog.append_tile(attribute, tile_size)
    }

    /// Finalize the catalog and make the fragment visible
    ///
    /// The fragment is committed only if this returns `Ok`. On error the
    /// pending metadata file is removed and the fragment stays invisible.
    pub fn commit(mut self) -> Result<FragmentId> {
        self.catalog.finalize()?;

        let pending_path = self.dir.join(PENDING_BOOK_KEEPING_FILE);
        let final_path = self.dir.join(BOOK_KEEPING_FILE);

        let (pending, file) = PendingFile::create(pending_path)?;
        let sink = BufWriter::with_capacity(self.config.chunk_size, file);
        let sink = self.catalog.flush(sink, &self.config)?;
        let file = sink.into_inner().map_err(|e| FragmentError::Io(e.into_error()))?;

        if self.config.sync_on_commit {
            file.sync_all()?;
        }
        let size = file.metadata()?.len();
        drop(file);

        let sync = self.config.sync_on_commit;
        publish(pending, &final_path, &self.dir, |dir| {
            if sync {
                sync_dir(dir)
            } else {
                Ok(())
            }
        })?;

        self.committed = true;
        info!(
            "Committed fragment {}: {} attributes, {} metadata bytes",
            self.id,
            self.catalog.attribute_count(),
            size
        );
        Ok(self.id)
    }

    /// Discard the fragment directory and everything in it
    pub fn abort(mut self) -> Result<()> {
        self.committed = true;
        fs::remove_dir_all(&self.dir)?;
        info!("Aborted fragment {}", self.id);
        Ok(())
    }
}

impl Drop for FragmentWriter {
    fn drop(&mut self) {
        if !self.committed {
            warn!(
                "Fragment {} dropped without commit; it will not be visible to readers",
                self.id
            );
        }
    }
}

/// Read side of one committed fragment
#[derive(Debug, Clone)]
pub struct FragmentReader {
    id: FragmentId,
    dir: PathBuf,
    catalog: Arc<BookKeeping>,
}

impl FragmentReader {
    /// Load the catalog of the fragment at `fragment_dir`
    pub fn open<P: AsRef<Path>>(fragment_dir: P) -> Result<Self> {
        let dir = fragment_dir.as_ref().to_path_buf();
        let id = extract_fragment_id(&dir)?;

        let file = File::open(dir.join(BOOK_KEEPING_FILE))?;
        if file.metadata()?.len() == 0 {
            return Err(FragmentError::CorruptData("empty metadata file".to_string()));
        }

        let catalog = BookKeeping::from_reader(BufReader::new(file))?;

        debug!(
            "Opened fragment {}: {} attributes",
            id,
            catalog.attribute_count()
        );

        Ok(FragmentReader {
            id,
            dir,
            catalog: Arc::new(catalog),
        })
    }

    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shared handle to the finalized catalog
    pub fn catalog(&self) -> &Arc<BookKeeping> {
        &self.catalog
    }

    pub fn range(&self) -> &SpatialRange {
        self.catalog.stored_range()
    }

    pub fn tile_offsets(&self, attribute: usize) -> Result<&[u64]> {
        self.catalog.tile_offsets(attribute)
    }
}

/// Committed fragments under `array_dir`, sorted by id
///
/// Directories without a metadata file (uncommitted or aborted writes) and
/// entries whose names are not fragment names are skipped.
pub fn list_fragments<P: AsRef<Path>>(array_dir: P) -> Result<Vec<(FragmentId, PathBuf)>> {
    let mut fragments = Vec::new();

    for entry in fs::read_dir(array_dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let id = match extract_fragment_id(&path) {
            Ok(id) => id,
            Err(_) => continue,
        };

        if path.join(BOOK_KEEPING_FILE).is_file() {
            fragments.push((id, path));
        } else {
            debug!("Skipping uncommitted fragment {:?}", path);
        }
    }

    fragments.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(fragments)
}
