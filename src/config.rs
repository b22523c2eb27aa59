//! Runtime settings resolved from CLI flags and environment.

use std::path::{Path, PathBuf};

use crate::extract::Store;
use crate::models::Category;

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "previous_data.json";

/// Rendered report file name inside the data directory.
pub const REPORT_FILE: &str = "sale_items_chart.html";

/// Resolved settings for one tracker run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where the snapshot, report, and debug dumps live.
    pub data_dir: PathBuf,
    pub headless: bool,
    /// Dump raw fetched markup next to the snapshot for selector debugging.
    pub debug_dumps: bool,
}

impl Settings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            headless: true,
            debug_dumps: false,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(REPORT_FILE)
    }

    pub fn debug_dump_path(&self, store: Store, category: Category) -> PathBuf {
        self.data_dir.join(format!(
            "{}_debug_{}.html",
            store.name().to_lowercase(),
            category.as_str().to_lowercase()
        ))
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if !Path::new(&self.data_dir).exists() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_land_in_the_data_dir() {
        let settings = Settings::new("/tmp/skatewatch-test");
        assert_eq!(
            settings.snapshot_path(),
            PathBuf::from("/tmp/skatewatch-test/previous_data.json")
        );
        assert_eq!(
            settings.report_path(),
            PathBuf::from("/tmp/skatewatch-test/sale_items_chart.html")
        );
    }

    #[test]
    fn test_debug_dump_names_are_lowercased() {
        let settings = Settings::new("/data");
        assert_eq!(
            settings.debug_dump_path(Store::SkateWarehouse, Category::Decks),
            PathBuf::from("/data/skatewarehouse_debug_decks.html")
        );
    }
}
