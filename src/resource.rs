use std::path::{Path, PathBuf};

/// Suffix appended to a resource's logical name to form its output name.
pub const OUTPUT_SUFFIX: &str = "output";

/// Resolves named resources to paths on behalf of the host application.
pub trait ResourceLocator: Send + Sync {
    /// Path of an existing resource `name` with type suffix `ext`.
    fn resolve(&self, name: &str, ext: &str) -> Option<PathBuf>;

    /// Where the copy of resource `name` goes.
    fn output_path(&self, name: &str) -> PathBuf;
}

/// Resources packaged as plain files in one directory. Outputs are placed
/// in the same directory.
#[derive(Debug, Clone)]
pub struct ResourceDir {
    root: PathBuf,
}

impl ResourceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceLocator for ResourceDir {
    fn resolve(&self, name: &str, ext: &str) -> Option<PathBuf> {
        let file = if ext.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", name, ext)
        };
        let path = self.root.join(file);
        path.is_file().then_some(path)
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, OUTPUT_SUFFIX))
    }
}
