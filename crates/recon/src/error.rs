use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad tolerance, empty keyword list, etc.).
    ConfigValidation(String),
    /// A config or input value that must be a decimal is not one.
    InvalidQuantity { field: String, value: String },
    /// Missing required column in input data.
    MissingColumn { table: String, column: String },
    /// A whole input table is absent or has no usable rows. Fatal for the run.
    MissingInput(String),
    /// Two master rows share a key and the duplicate policy is `reject`.
    DuplicateMasterKey { work_name: String, spec: String, unit: String },
    /// CSV read error.
    Csv(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InvalidQuantity { field, value } => {
                write!(f, "{field}: '{value}' is not a decimal quantity")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "{table} table: missing column '{column}'")
            }
            Self::MissingInput(what) => write!(f, "no {what} found"),
            Self::DuplicateMasterKey { work_name, spec, unit } => write!(
                f,
                "master table lists ({work_name}, {spec}, {unit}) more than once (on_duplicate = \"reject\")"
            ),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
