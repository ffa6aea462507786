//! Env file - Load key/value configuration injected into containers
//!
//! The file is read with `dotenvy`. Values are passed through verbatim;
//! nothing here interprets them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

/// Ordered key/value pairs, in file order
pub type EnvMap = IndexMap<String, String>;

/// Errors raised while loading an env file
#[derive(Debug, Error)]
pub enum EnvFileError {
    /// The file does not exist; construction must not proceed
    #[error("{} file not found!", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be parsed
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Load an env file into an ordered mapping.
///
/// Fails with [`EnvFileError::NotFound`] if the file is absent. A key that
/// appears twice keeps its first position and takes the last value.
pub fn load_env_file(path: &Path) -> Result<EnvMap, EnvFileError> {
    if !path.is_file() {
        return Err(EnvFileError::NotFound(path.to_path_buf()));
    }

    let parse_error = |e: dotenvy::Error| EnvFileError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut env = EnvMap::new();
    for item in dotenvy::from_path_iter(path).map_err(parse_error)? {
        let (key, value) = item.map_err(parse_error)?;
        env.insert(key, value);
    }

    log::debug!("loaded {} entries from {}", env.len(), path.display());
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_env(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        let err = load_env_file(&path).unwrap_err();
        assert!(matches!(err, EnvFileError::NotFound(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn directory_is_not_an_env_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_env_file(dir.path()),
            Err(EnvFileError::NotFound(_))
        ));
    }

    #[test]
    fn loads_pairs_in_file_order() {
        let file = write_env("ZED=1\n# comment\nALPHA=two\nQUOTED=\"with spaces\"\n");
        let env = load_env_file(file.path()).unwrap();

        let keys: Vec<_> = env.keys().cloned().collect();
        assert_eq!(keys, vec!["ZED", "ALPHA", "QUOTED"]);
        assert_eq!(env["QUOTED"], "with spaces");
    }

    #[test]
    fn empty_file_yields_empty_map() {
        let file = write_env("");
        assert!(load_env_file(file.path()).unwrap().is_empty());
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let file = write_env("FOO=bar\nFOO=baz\n");
        let env = load_env_file(file.path()).unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env["FOO"], "baz");
    }
}
