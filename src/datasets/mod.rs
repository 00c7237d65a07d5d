use std::{fmt::Display, str::FromStr};

/// The Korean TLINK dataset
pub mod tlink;

/// A dataset split
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Mode {
    /// Training split
    Train,

    /// Development split, used for early stopping
    Dev,

    /// Held-out test split
    Test,
}

impl Mode {
    /// The string token for this split
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Dev => "dev",
            Mode::Test => "test",
        }
    }
}

impl FromStr for Mode {
    type Err = DatasetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "train" => Ok(Mode::Train),
            "dev" => Ok(Mode::Dev),
            "test" => Ok(Mode::Test),
            _ => Err(DatasetError::UnknownMode(value.to_string())),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// The split name was not one of train, dev or test
    #[error("only train, dev and test modes are available, got {0}")]
    UnknownMode(String),

    /// A line did not hold exactly a sentence and a label
    #[error("{path}:{line}: expected `sentence<TAB>label`")]
    Malformed {
        /// The file being read
        path: String,
        /// The 1-based line number
        line: u64,
    },

    /// The label file held no labels
    #[error("no labels found in {0}")]
    NoLabels(String),

    /// Underlying IO failure
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying TSV parsing failure
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("train".parse::<Mode>().unwrap(), Mode::Train);
        assert_eq!("dev".parse::<Mode>().unwrap(), Mode::Dev);
        assert_eq!("test".parse::<Mode>().unwrap(), Mode::Test);
        assert!(matches!(
            "valid".parse::<Mode>(),
            Err(DatasetError::UnknownMode(mode)) if mode == "valid"
        ));
    }
}
