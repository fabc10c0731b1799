//! Filesystem access for file analysis.

use std::path::Path;

use crate::error::Result;

/// Abstraction over reading source files.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Read a file's raw bytes.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
}

/// Default filesystem implementation backed by `std::fs`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Create a new standard filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFileSystem {
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::StdFileSystem;
    use crate::error::EducatorError;
    use crate::fs::FileSystem;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn std_filesystem_reads_bytes() {
        let root = std::env::temp_dir().join(unique_dir_name());
        std::fs::create_dir_all(&root).expect("create temp dir");
        let file_path = root.join("hello.py");
        std::fs::write(&file_path, "print('hello')").expect("write test file");

        let bytes = StdFileSystem::new().read_bytes(&file_path).expect("read file");
        assert_eq!(bytes, b"print('hello')");

        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join(unique_dir_name()).join("absent.py");
        let err = StdFileSystem::new().read_bytes(&path).unwrap_err();
        assert!(matches!(err, EducatorError::Io(_)));
    }

    pub(crate) fn unique_dir_name() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let count = COUNTER.fetch_add(1, Ordering::SeqCst);
        PathBuf::from(format!("educator_core_test_{nanos}_{count}"))
    }
}
