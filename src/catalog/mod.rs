use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Cannot read transform file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid transform file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Named transforms mapped to their command argument templates.
///
/// The table is loaded from a TOML file and replaced wholesale on reload, so
/// concurrent readers always see a complete snapshot.
pub struct TransformCatalog {
    path: PathBuf,
    transforms: RwLock<Arc<HashMap<String, Vec<String>>>>,
}

impl TransformCatalog {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let transforms = Arc::new(read_transforms(&path)?);
        info!(
            "Loaded {} transforms from {}",
            transforms.len(),
            path.display()
        );
        Ok(Self {
            path,
            transforms: RwLock::new(transforms),
        })
    }

    /// Re-read the transform file and publish the new table.
    pub fn reload(&self) -> Result<(), CatalogError> {
        let fresh = Arc::new(read_transforms(&self.path)?);
        info!(
            "Reloaded {} transforms from {}",
            fresh.len(),
            self.path.display()
        );
        *self.transforms.write() = fresh;
        Ok(())
    }

    /// Argument templates for a named transform, if it is configured.
    pub fn get(&self, name: &str) -> Option<Vec<String>> {
        self.transforms.read().get(name).cloned()
    }
}

fn read_transforms(path: &Path) -> Result<HashMap<String, Vec<String>>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_templates_by_name() {
        let file = write_catalog("thumb = [\"-resize {{width}}x{{height}}\"]\n");
        let catalog = TransformCatalog::load(file.path()).unwrap();

        assert_eq!(
            catalog.get("thumb"),
            Some(vec!["-resize {{width}}x{{height}}".to_string()])
        );
    }

    #[test]
    fn missing_name_is_none() {
        let file = write_catalog("thumb = [\"-resize {{width}}x{{height}}\"]\n");
        let catalog = TransformCatalog::load(file.path()).unwrap();

        assert_eq!(catalog.get("does-not-exist"), None);
    }

    #[test]
    fn reload_replaces_table_wholesale() {
        let mut file = write_catalog("thumb = [\"-resize {{width}}x{{height}}\"]\n");
        let catalog = TransformCatalog::load(file.path()).unwrap();

        file.as_file_mut().set_len(0).unwrap();
        use std::io::Seek;
        file.as_file_mut().rewind().unwrap();
        file.write_all(b"crop = [\"-crop {{width}}x{{height}}+0+0\"]\n")
            .unwrap();
        file.flush().unwrap();

        catalog.reload().unwrap();

        assert_eq!(catalog.get("thumb"), None);
        assert_eq!(
            catalog.get("crop"),
            Some(vec!["-crop {{width}}x{{height}}+0+0".to_string()])
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        assert!(TransformCatalog::load("/does/not/exist.toml").is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let file = write_catalog("thumb = 12\n");
        assert!(TransformCatalog::load(file.path()).is_err());
    }
}
