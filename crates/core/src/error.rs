use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot access {path}: {source}", path = path.display())]
    FilesystemAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("no usable internet connection: {0}")]
    Connectivity(String),
    #[error("data root does not exist: {}", .0.display())]
    DataRootNotFound(PathBuf),
    #[error("failed to locate git work tree: {0}")]
    Git(#[from] git2::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ram_types::TextError),

    #[error("failed to read configuration {path}: {source}", path = path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write configuration {path}: {source}", path = path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("could not determine home directory")]
    HomeDirNotFound,

    #[error("failed to run {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
    },
}

impl UploadError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FilesystemAccess {
            path: path.into(),
            source,
        }
    }
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
