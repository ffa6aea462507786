//! Container image assets built from a local Dockerfile
//!
//! Assets are not built here. Each one gets a content hash that tags the
//! image in the asset repository, and the [`AssetManifest`] tells an external
//! builder what to build and where to push it.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use agentstack_core::resource::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

/// Repository images are pushed to unless configured otherwise
pub const DEFAULT_ASSET_REPOSITORY: &str = "agentstack-container-assets";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Asset build context not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Dockerfile not found: {}", .0.display())]
    MissingDockerfile(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize asset manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Target platform of a built image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "linux/amd64")]
    LinuxAmd64,
    #[serde(rename = "linux/arm64")]
    LinuxArm64,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::LinuxAmd64 => write!(f, "linux/amd64"),
            Platform::LinuxArm64 => write!(f, "linux/arm64"),
        }
    }
}

/// An image built from `directory` with `dockerfile`
#[derive(Debug, Clone, PartialEq)]
pub struct DockerImageAsset {
    directory: PathBuf,
    dockerfile: String,
    platform: Option<Platform>,
    repository_name: String,
    region: Option<String>,
    hash: String,
}

impl DockerImageAsset {
    /// Locate the Dockerfile and compute the asset hash.
    ///
    /// The hash covers the platform, the Dockerfile name and every file in
    /// the build context, so any source edit produces a new image tag.
    pub fn new(
        directory: impl AsRef<Path>,
        dockerfile: impl Into<String>,
        platform: Option<Platform>,
    ) -> Result<Self, AssetError> {
        let directory = directory.as_ref().to_path_buf();
        let dockerfile = dockerfile.into();

        if !directory.is_dir() {
            return Err(AssetError::MissingDirectory(directory));
        }
        let dockerfile_path = directory.join(&dockerfile);
        if !dockerfile_path.is_file() {
            return Err(AssetError::MissingDockerfile(dockerfile_path));
        }

        let hash = hash_build_context(&directory, &dockerfile, platform)?;
        log::debug!("asset {} hashed to {}", dockerfile_path.display(), hash);
        Ok(Self {
            directory,
            dockerfile,
            platform,
            repository_name: DEFAULT_ASSET_REPOSITORY.to_string(),
            region: None,
            hash,
        })
    }

    pub fn with_repository(mut self, repository_name: impl Into<String>) -> Self {
        self.repository_name = repository_name.into();
        self
    }

    /// Pin the image to the repository in `region` instead of the deploying region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    /// Hex SHA-256 of the asset source; also the image tag
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Image URI in the deploying account, in the pinned region if any
    pub fn image_uri(&self) -> Value {
        let region = match &self.region {
            Some(region) => Value::string(region),
            None => Value::Pseudo("AWS::Region".to_string()),
        };
        Value::Join(vec![
            Value::Pseudo("AWS::AccountId".to_string()),
            Value::string(".dkr.ecr."),
            region,
            Value::string(format!(
                ".amazonaws.com/{}:{}",
                self.repository_name, self.hash
            )),
        ])
    }
}

fn hash_build_context(directory: &Path, dockerfile: &str, platform: Option<Platform>) -> Result<String, AssetError> {
    let mut hasher = Sha256::new();
    if let Some(platform) = platform {
        hasher.update(platform.to_string().as_bytes());
    }
    hasher.update([0u8]);
    hasher.update(dockerfile.as_bytes());
    hasher.update([0u8]);

    let walker = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != OsStr::new(".git"));
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory).to_path_buf();
            AssetError::Io { path, source: e.into() }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let contents = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let relative = path.strip_prefix(directory).unwrap_or(path);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update((contents.len() as u64).to_le_bytes());
        hasher.update(&contents);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub directory: PathBuf,
    pub dockerfile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDestination {
    pub region: String,
    pub repository_name: String,
    pub image_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerImageEntry {
    pub source: ImageSource,
    pub destinations: BTreeMap<String, ImageDestination>,
}

/// Images an external builder must build and push before deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub version: String,
    pub docker_images: BTreeMap<String, DockerImageEntry>,
    #[serde(skip)]
    region: String,
}

impl AssetManifest {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            version: "1".to_string(),
            docker_images: BTreeMap::new(),
            region: region.into(),
        }
    }

    /// Register an asset; identical assets collapse to one entry.
    ///
    /// The destination is the asset's pinned region, or the manifest's.
    pub fn add(&mut self, asset: &DockerImageAsset) {
        let region = asset.region.clone().unwrap_or_else(|| self.region.clone());
        let destination = ImageDestination {
            region: region.clone(),
            repository_name: asset.repository_name.clone(),
            image_tag: asset.hash.clone(),
        };
        self.docker_images.insert(
            asset.hash.clone(),
            DockerImageEntry {
                source: ImageSource {
                    directory: asset.directory.clone(),
                    dockerfile: asset.dockerfile.clone(),
                    platform: asset.platform,
                },
                destinations: BTreeMap::from([(
                    format!("current_account-{}", region),
                    destination,
                )]),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.docker_images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docker_images.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DockerImageAsset::new(dir.path().join("nope"), "api.Dockerfile", None).unwrap_err();
        assert!(matches!(err, AssetError::MissingDirectory(_)));
    }

    #[test]
    fn missing_dockerfile_is_an_error() {
        let dir = context(&[]);
        let err = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap_err();
        assert!(matches!(err, AssetError::MissingDockerfile(_)));
    }

    #[test]
    fn hash_depends_on_contents_and_platform() {
        let dir = context(&[
            ("api.Dockerfile", "FROM python:3.11\n"),
            ("app.Dockerfile", "FROM python:3.11\n"),
        ]);

        let api = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();
        let again = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();
        let amd64 = DockerImageAsset::new(dir.path(), "api.Dockerfile", Some(Platform::LinuxAmd64)).unwrap();
        let app = DockerImageAsset::new(dir.path(), "app.Dockerfile", None).unwrap();

        assert_eq!(api.hash(), again.hash());
        assert_eq!(api.hash().len(), 64);
        assert_ne!(api.hash(), amd64.hash());
        assert_ne!(api.hash(), app.hash());
    }

    #[test]
    fn image_uri_uses_deploy_time_account_and_region() {
        let dir = context(&[("app.Dockerfile", "FROM scratch\n")]);
        let asset = DockerImageAsset::new(dir.path(), "app.Dockerfile", None)
            .unwrap()
            .with_repository("my-assets");

        let json = asset.image_uri().to_json();
        let parts = json["Fn::Join"][1].as_array().unwrap();
        assert_eq!(parts[0], serde_json::json!({ "Ref": "AWS::AccountId" }));
        assert_eq!(parts[2], serde_json::json!({ "Ref": "AWS::Region" }));
        assert_eq!(
            parts[3],
            serde_json::json!(format!(".amazonaws.com/my-assets:{}", asset.hash()))
        );
    }

    #[test]
    fn manifest_lists_each_image_once() {
        let dir = context(&[("api.Dockerfile", "FROM python:3.11\n")]);
        let asset =
            DockerImageAsset::new(dir.path(), "api.Dockerfile", Some(Platform::LinuxAmd64)).unwrap();

        let mut manifest = AssetManifest::new("us-east-1");
        manifest.add(&asset);
        manifest.add(&asset);
        assert_eq!(manifest.len(), 1);

        let json: serde_json::Value =
            serde_json::from_str(&manifest.to_json_pretty().unwrap()).unwrap();
        let entry = &json["dockerImages"][asset.hash()];
        assert_eq!(entry["source"]["platform"], "linux/amd64");
        assert_eq!(
            entry["destinations"]["current_account-us-east-1"]["repositoryName"],
            DEFAULT_ASSET_REPOSITORY
        );
        assert_eq!(
            entry["destinations"]["current_account-us-east-1"]["imageTag"],
            asset.hash()
        );
        assert!(entry["destinations"]["current_account-us-east-1"].get("repository_name").is_none());
    }

    #[test]
    fn hash_covers_the_whole_build_context() {
        let dir = context(&[("api.Dockerfile", "FROM python:3.11\n"), ("chatbot.py", "print('v1')\n")]);
        let before = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();

        std::fs::write(dir.path().join("chatbot.py"), "print('v2')\n").unwrap();
        let edited = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();
        assert_ne!(before.hash(), edited.hash());

        std::fs::create_dir(dir.path().join("agents")).unwrap();
        std::fs::write(dir.path().join("agents/tools.py"), "TOOLS = []\n").unwrap();
        let added = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();
        assert_ne!(edited.hash(), added.hash());

        let again = DockerImageAsset::new(dir.path(), "api.Dockerfile", None).unwrap();
        assert_eq!(added.hash(), again.hash());
    }

    #[test]
    fn git_metadata_does_not_change_the_hash() {
        let dir = context(&[("app.Dockerfile", "FROM scratch\n")]);
        let before = DockerImageAsset::new(dir.path(), "app.Dockerfile", None).unwrap();

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        let after = DockerImageAsset::new(dir.path(), "app.Dockerfile", None).unwrap();
        assert_eq!(before.hash(), after.hash());
    }

    #[test]
    fn pinned_region_is_used_by_image_and_manifest() {
        let dir = context(&[("app.Dockerfile", "FROM scratch\n")]);
        let asset = DockerImageAsset::new(dir.path(), "app.Dockerfile", None)
            .unwrap()
            .with_region("eu-west-1");
        assert_eq!(asset.region(), Some("eu-west-1"));

        let json = asset.image_uri().to_json();
        assert_eq!(json["Fn::Join"][1][2], "eu-west-1");

        let mut manifest = AssetManifest::new("us-east-1");
        manifest.add(&asset);
        let entry = &manifest.docker_images[asset.hash()];
        assert_eq!(entry.destinations["current_account-eu-west-1"].region, "eu-west-1");
    }
}
