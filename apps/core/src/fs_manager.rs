use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

pub struct PortablePathManager;

impl PortablePathManager {
    /// Returns the application root directory (where the executable lives).
    pub fn root_dir() -> PathBuf {
        #[cfg(debug_assertions)]
        {
            // In development (Debug), we want to point to apps/core.
            // The executable is usually in target/debug at the workspace root.
            let mut path = std::env::current_exe().expect("Failed to get current exe");
            path.pop(); // remove exe name
            path.pop(); // remove debug
            path.pop(); // remove target

            // Check if we are at workspace root and apps/core exists
            let core_path = path.join("apps").join("core");
            if core_path.exists() {
                return core_path;
            }

            // Fallback: maybe we are already in apps/core (if target was local)
            return path;
        }

        #[cfg(not(debug_assertions))]
        match std::env::current_exe() {
            Ok(mut path) => {
                path.pop();
                path
            }
            Err(e) => {
                error!(
                    "Failed to get current exe path: {}. Falling back to current_dir.",
                    e
                );
                std::env::current_dir().expect("Failed to get current directory")
            }
        }
    }

    /// Returns the main data directory (./data).
    pub fn data_dir() -> PathBuf {
        Self::root_dir().join("data")
    }

    /// Returns the database directory (./data/db).
    pub fn db_dir() -> PathBuf {
        Self::data_dir().join("db")
    }

    /// Returns the knowledge corpus directory (./data/knowledge).
    pub fn knowledge_dir() -> PathBuf {
        Self::data_dir().join("knowledge")
    }

    /// Initializes the on-disk tree.
    /// Creates the data, db and knowledge directories if they do not exist.
    pub fn init() -> Result<(), std::io::Error> {
        let data_path = Self::data_dir();
        let db_path = Self::db_dir();
        let knowledge_path = Self::knowledge_dir();

        if !data_path.exists() {
            info!("Creating data directory: {:?}", data_path);
            fs::create_dir_all(&data_path)?;
        }

        if !db_path.exists() {
            info!("Creating db directory: {:?}", db_path);
            fs::create_dir_all(&db_path)?;
        }

        if !knowledge_path.exists() {
            info!("Creating knowledge directory: {:?}", knowledge_path);
            fs::create_dir_all(&knowledge_path)?;
        }

        Ok(())
    }
}
