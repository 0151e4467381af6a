//! DataSpace - owning context for a family of vectors
//!
//! A `DataSpace` holds everything vectors share: the configuration, the
//! memory manager, the backing store and the string dictionary. Vectors
//! created through it are bound to those collaborators; closing the space
//! swaps out every resident segment it manages.
//!
//! # Usage
//!
//! ```no_run
//! use colvec::{DataSpace, StoreConfig};
//!
//! let space = DataSpace::new(StoreConfig::default().with_spill_dir("/tmp/colvec")).unwrap();
//!
//! let mut prices = space.create_vector::<f64>();
//! prices.append_slice(&[9.5, 12.0, 7.25]).unwrap();
//! prices.seal().unwrap();
//!
//! let cheap = prices.filter(|p| p < 10.0).unwrap();
//! assert_eq!(prices.subset(&cheap).unwrap().len(), 2);
//!
//! space.close().unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::element::{Element, ElementKind};
use crate::error::Result;
use crate::memory::{BudgetMemoryManager, MemoryManager};
use crate::resource::MemoryBudget;
use crate::segment::SegmentContext;
use crate::store::{BackingStore, FileBackingStore, MemoryBackingStore};
use crate::string_table::{StringDictionary, StringTable};
use crate::vector::{Column, SegmentedVector, StringVector};

/// Subdirectory used for swap images by [`DataSpace::open`].
pub const SWAP_DIR_NAME: &str = "swap";

pub struct DataSpace {
    config: StoreConfig,
    manager: Arc<BudgetMemoryManager>,
    store: Arc<dyn BackingStore>,
    dictionary: Arc<dyn StringDictionary>,
}

impl DataSpace {
    /// Build a space from `config`: a file store when `spill_dir` is set,
    /// an auto-detected budget when `memory_budget_bytes` is absent.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let manager = match config.memory_budget_bytes {
            Some(bytes) => BudgetMemoryManager::new(MemoryBudget::new(bytes)),
            None => BudgetMemoryManager::auto_detect(),
        };
        let store: Arc<dyn BackingStore> = match &config.spill_dir {
            Some(dir) => Arc::new(FileBackingStore::create(dir)?),
            None => Arc::new(MemoryBackingStore::new()),
        };

        tracing::info!(
            budget = manager.budget(),
            segment_size = config.segment_size,
            spill_dir = ?config.spill_dir,
            "opened data space"
        );

        Ok(Self {
            config,
            manager: Arc::new(manager),
            store,
            dictionary: Arc::new(StringTable::new()),
        })
    }

    /// Unbounded memory, in-memory store, default config.
    pub fn ephemeral() -> Self {
        Self {
            config: StoreConfig::default(),
            manager: Arc::new(BudgetMemoryManager::unbounded()),
            store: Arc::new(MemoryBackingStore::new()),
            dictionary: Arc::new(StringTable::new()),
        }
    }

    /// Open a space rooted at `dir`, reading `colvec_config.json` if present
    /// and writing the effective config otherwise. Swap images go under
    /// `dir/swap` unless the config names another directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut config = match StoreConfig::read_from(dir)? {
            Some(config) => config,
            None => {
                let config = StoreConfig::default();
                config.write_to(dir)?;
                config
            }
        };
        if config.spill_dir.is_none() {
            config.spill_dir = Some(dir.join(SWAP_DIR_NAME));
        }
        Self::new(config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<BudgetMemoryManager> {
        &self.manager
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    pub fn dictionary(&self) -> &Arc<dyn StringDictionary> {
        &self.dictionary
    }

    /// Collaborators handed to every vector of this space.
    pub fn context(&self) -> SegmentContext {
        let manager: Arc<dyn MemoryManager> = self.manager.clone();
        SegmentContext::new(manager, self.store.clone())
    }

    pub fn create_vector<T: Element>(&self) -> SegmentedVector<T> {
        SegmentedVector::new(self.context(), self.config.vector_options())
    }

    pub fn create_string_vector(&self) -> StringVector {
        StringVector::new(
            self.context(),
            self.config.vector_options(),
            self.dictionary.clone(),
        )
    }

    /// Empty column of the given kind.
    pub fn create_column(&self, kind: ElementKind) -> Column {
        match kind {
            ElementKind::Byte => Column::Byte(self.create_vector()),
            ElementKind::Short => Column::Short(self.create_vector()),
            ElementKind::Int => Column::Int(self.create_vector()),
            ElementKind::Long => Column::Long(self.create_vector()),
            ElementKind::Float => Column::Float(self.create_vector()),
            ElementKind::Double => Column::Double(self.create_vector()),
            ElementKind::Boolean => Column::Logical(self.create_vector()),
            ElementKind::String => Column::String(self.create_string_vector()),
        }
    }

    pub fn resident_bytes(&self) -> usize {
        self.manager.resident_bytes()
    }

    /// Swap out every unpinned segment of every vector in this space.
    /// Returns how many segments were swapped out.
    pub fn close(&self) -> Result<usize> {
        let swapped = self.manager.swap_out_all()?;
        tracing::info!(swapped, "closed data space");
        Ok(swapped)
    }
}

impl std::fmt::Debug for DataSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSpace")
            .field("config", &self.config)
            .field("manager", &self.manager)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_ephemeral_space() {
        let space = DataSpace::ephemeral();
        let mut v = space.create_vector::<i32>();
        v.append_slice(&[1, 2, 3]).unwrap();
        v.seal().unwrap();
        assert_eq!(space.resident_bytes(), 12);
        assert_eq!(space.close().unwrap(), 1);
        assert_eq!(space.resident_bytes(), 0);
        assert_eq!(v.get(2).unwrap(), 3);
    }

    #[test]
    fn test_open_writes_default_config() {
        let dir = TempDir::new().unwrap();
        let space = DataSpace::open(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(space.config().spill_dir, Some(dir.path().join(SWAP_DIR_NAME)));
        assert!(dir.path().join(SWAP_DIR_NAME).is_dir());
    }

    #[test]
    fn test_open_reads_existing_config() {
        let dir = TempDir::new().unwrap();
        StoreConfig::default()
            .with_segment_size(8)
            .with_memory_budget(1024)
            .write_to(dir.path())
            .unwrap();
        let space = DataSpace::open(dir.path()).unwrap();
        assert_eq!(space.config().segment_size, 8);
        assert_eq!(space.manager().budget(), 1024);
        assert_eq!(space.create_vector::<i8>().segment_size(), 8);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = DataSpace::new(StoreConfig::default().with_segment_size(0)).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_columns_share_dictionary() {
        let space = DataSpace::ephemeral();
        let mut a = space.create_string_vector();
        let mut b = space.create_string_vector();
        a.append("red").unwrap();
        b.append("red").unwrap();
        b.append("blue").unwrap();
        assert_eq!(space.dictionary().len(), 2);

        let column = space.create_column(ElementKind::Boolean);
        assert_eq!(column.kind(), ElementKind::Boolean);
    }
}
