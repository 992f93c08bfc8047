use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectsError {
    #[error("invalid glob pattern {pattern}: {source}")]
    InvalidPattern { pattern: String, source: glob::PatternError },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error in {path}: {source}")]
    ConfigParse { path: String, source: serde_yaml::Error },
}

pub type ProjectsResult<T> = Result<T, ProjectsError>;
