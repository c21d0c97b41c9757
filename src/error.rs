use std::fmt;

#[derive(Debug)]
pub enum SceneError {
    Xml(String),
    InvalidConfiguration(String),
    Io(std::io::Error),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Xml(message) => write!(f, "malformed document: {}", message),
            SceneError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            SceneError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SceneError {
    fn from(value: std::io::Error) -> Self {
        SceneError::Io(value)
    }
}

impl From<roxmltree::Error> for SceneError {
    fn from(value: roxmltree::Error) -> Self {
        SceneError::Xml(value.to_string())
    }
}
