use thiserror::Error;

pub type EscalaResult<T> = Result<T, EscalaError>;

#[derive(Debug, Error)]
pub enum EscalaError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Errors raised while validating and normalizing the three input tables.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Missing required column '{column}' in the {table} table")]
    MissingColumn { table: &'static str, column: String },

    #[error("Unparseable date '{value}' in the {table} table")]
    InvalidDate { table: &'static str, value: String },

    #[error("Worker id '{0}' is not an integer")]
    InvalidWorkerId(String),

    #[error("Worker {worker} has a negative derived quality-off quota (l_q = {l_q})")]
    MalformedQuota { worker: i64, l_q: i64 },

    #[error("Unknown status letter '{0}' in a schedule table")]
    InvalidStatus(String),

    #[error("No worker appears in both the employee and calendar tables")]
    EmptyWorkerIntersection,

    #[error("The calendar table yields an empty horizon")]
    EmptyHorizon,

    #[error("Data frame error: {0}")]
    DataFrame(#[from] polars::error::PolarsError),
}

impl From<polars::error::PolarsError> for EscalaError {
    fn from(err: polars::error::PolarsError) -> Self {
        EscalaError::Input(InputError::DataFrame(err))
    }
}

/// Errors in the construction of the constraint model itself.
///
/// Any of these surfaces as the `MODEL_INVALID` solver status: the model was
/// malformed before the search ever started.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Variable {var} has an inverted domain [{lb}, {ub}]")]
    InvalidDomain { var: usize, lb: i64, ub: i64 },

    #[error("Constraint references unknown variable {0}")]
    UnknownVariable(usize),

    #[error("Linear activity overflows the integer range: {0}")]
    Overflow(String),

    #[error("exactly-one constraint over an empty literal set")]
    EmptyExactlyOne,
}

/// Terminal solver outcomes that do not carry a schedule.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("Solver returned INFEASIBLE: the hard constraints admit no schedule ({diagnostics})")]
    Infeasible { diagnostics: String },

    #[error("Solver returned MODEL_INVALID: {0}")]
    ModelInvalid(String),

    #[error("Solver returned UNKNOWN: no feasible schedule within the {limit_secs} s time limit")]
    TimeLimit { limit_secs: u64 },
}
