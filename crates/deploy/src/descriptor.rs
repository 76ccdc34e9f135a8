//! Loading the Fluxfile.

use std::path::Path;

use crate::error::DeployError;

/// Supplies the Fluxfile text for a deployment.
pub trait DescriptorSource {
    fn read(&self, path: &Path) -> Result<String, DeployError>;
}

/// Reads the Fluxfile from the local filesystem, verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDescriptorSource;

impl DescriptorSource for FsDescriptorSource {
    fn read(&self, path: &Path) -> Result<String, DeployError> {
        std::fs::read_to_string(path).map_err(|source| DeployError::File {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_file_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let text = "jobs:\n  build:\n    image: rust\n";
        file.write_all(text.as_bytes()).unwrap();

        assert_eq!(FsDescriptorSource.read(file.path()).unwrap(), text);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Fluxfile");

        let err = FsDescriptorSource.read(&path).unwrap_err();
        match err {
            DeployError::File { path: p, source } => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected file error, got {other:?}"),
        }
    }
}
