//! Extension package inspection

use crate::error::{Result, StoreError};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// A package read into memory for upload
#[derive(Debug, Clone)]
pub struct Package {
    /// File name sent with multipart uploads
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Package {
    /// Read a package from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                StoreError::InvalidArtifact(format!("{} does not exist", path.display()))
            }
            _ => StoreError::Io(e),
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.zip".to_string());

        debug!(file = %path.display(), bytes = bytes.len(), "Loaded package");

        Ok(Self { file_name, bytes })
    }
}

/// Largest entry [`read_entry`] will inflate
pub const MAX_ENTRY_BYTES: u64 = 4 * 1024 * 1024;

/// Read one entry out of a zip archive
pub fn read_entry(archive: &Path, name: &str) -> Result<Vec<u8>> {
    let file = File::open(archive).map_err(|e| {
        StoreError::InvalidArtifact(format!("cannot open {}: {}", archive.display(), e))
    })?;
    let mut zip = zip::ZipArchive::new(file)?;

    let entry = match zip.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(StoreError::InvalidArtifact(format!(
                "{} has no {}",
                archive.display(),
                name
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let mut content = Vec::new();
    entry.take(MAX_ENTRY_BYTES + 1).read_to_end(&mut content)?;
    if content.len() as u64 > MAX_ENTRY_BYTES {
        return Err(StoreError::InvalidArtifact(format!(
            "{} in {} is larger than {} bytes",
            name,
            archive.display(),
            MAX_ENTRY_BYTES
        )));
    }
    Ok(content)
}

/// Fields of `manifest.json` the stores key their APIs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    /// Gecko add-on ID
    pub extension_id: String,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    version: Option<String>,
    browser_specific_settings: Option<GeckoSettings>,
    applications: Option<GeckoSettings>,
}

#[derive(Debug, Deserialize)]
struct GeckoSettings {
    gecko: Option<Gecko>,
}

#[derive(Debug, Deserialize)]
struct Gecko {
    id: Option<String>,
}

impl GeckoSettings {
    fn id(&self) -> Option<&str> {
        self.gecko
            .as_ref()
            .and_then(|g| g.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

impl Manifest {
    /// Parse `manifest.json` from a packaged extension
    pub fn from_archive(archive: &Path) -> Result<Self> {
        let content = read_entry(archive, "manifest.json")?;
        Self::parse(&content)
    }

    /// [`Manifest::from_archive`] off the async runtime
    pub async fn load(archive: &Path) -> Result<Self> {
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || Self::from_archive(&archive))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    /// Parse manifest JSON
    ///
    /// The ID comes from `browser_specific_settings.gecko.id`, or the older
    /// `applications.gecko.id`.
    pub fn parse(content: &[u8]) -> Result<Self> {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        let raw: RawManifest = serde_json::from_slice(content)
            .map_err(|e| StoreError::InvalidArtifact(format!("invalid manifest.json: {}", e)))?;

        let version = raw
            .version
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StoreError::InvalidArtifact("manifest.json has no version".into()))?;

        let extension_id = raw
            .browser_specific_settings
            .as_ref()
            .and_then(GeckoSettings::id)
            .or_else(|| raw.applications.as_ref().and_then(GeckoSettings::id))
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::InvalidArtifact("manifest.json has no gecko add-on id".into())
            })?;

        Ok(Self {
            version,
            extension_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{firefox_package, write_zip};

    #[test]
    fn test_read_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_zip(dir.path(), "a.zip", &[("dir/file.txt", &b"hello"[..])]);

        assert_eq!(read_entry(&path, "dir/file.txt").unwrap(), b"hello");

        let err = read_entry(&path, "missing.txt").unwrap_err();
        assert!(matches!(err, StoreError::InvalidArtifact(_)));
    }

    #[test]
    fn test_read_entry_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![b' '; MAX_ENTRY_BYTES as usize + 1];
        let path = write_zip(dir.path(), "big.zip", &[("manifest.json", &big[..])]);

        let err = read_entry(&path, "manifest.json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidArtifact(ref m) if m.contains("larger than")));
    }

    #[test]
    fn test_read_entry_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let err = read_entry(&path, "manifest.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_manifest_from_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = firefox_package(dir.path(), "test@example.com", "1.2.3");

        let manifest = Manifest::from_archive(&path).unwrap();
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.extension_id, "test@example.com");
    }

    #[tokio::test]
    async fn test_manifest_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = firefox_package(dir.path(), "test@example.com", "2.0");

        let manifest = Manifest::load(&path).await.unwrap();
        assert_eq!(manifest.version, "2.0");

        let err = Manifest::load(&dir.path().join("missing.zip")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArtifact(_)));
    }

    #[test]
    fn test_manifest_legacy_applications_key() {
        let manifest = Manifest::parse(
            br#"{"version":"0.1","applications":{"gecko":{"id":"{abc-123}"}}}"#,
        )
        .unwrap();
        assert_eq!(manifest.extension_id, "{abc-123}");
    }

    #[test]
    fn test_manifest_prefers_browser_specific_settings() {
        let manifest = Manifest::parse(
            br#"{
                "version": "2.0",
                "applications": {"gecko": {"id": "old@example.com"}},
                "browser_specific_settings": {"gecko": {"id": "new@example.com"}}
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.extension_id, "new@example.com");
    }

    #[test]
    fn test_manifest_with_bom() {
        let mut content = b"\xEF\xBB\xBF".to_vec();
        content.extend_from_slice(br#"{"version":"1","applications":{"gecko":{"id":"x@y"}}}"#);
        assert_eq!(Manifest::parse(&content).unwrap().version, "1");
    }

    #[test]
    fn test_manifest_missing_fields() {
        let no_id = Manifest::parse(br#"{"version":"1.0"}"#).unwrap_err();
        assert!(no_id.to_string().contains("gecko"));

        let no_version =
            Manifest::parse(br#"{"applications":{"gecko":{"id":"x@y"}}}"#).unwrap_err();
        assert!(no_version.to_string().contains("version"));

        let garbage = Manifest::parse(b"{").unwrap_err();
        assert!(matches!(garbage, StoreError::InvalidArtifact(_)));
    }

    #[tokio::test]
    async fn test_package_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext.zip");
        std::fs::write(&path, b"PK bytes").unwrap();

        let package = Package::load(&path).await.unwrap();
        assert_eq!(package.file_name, "ext.zip");
        assert_eq!(package.bytes, b"PK bytes");

        let err = Package::load(&dir.path().join("nope.zip")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArtifact(_)));
    }
}
