use sea_orm::DbErr;

/// Unified error taxonomy for every engine component. Transport-level and
/// store-level failures are folded into these variants so callers at the
/// command surface never match on a lower-level error type.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A transport failure the caller should retry (connection reset, 4xx
    /// SMTP reply, timeout). Distinguished from `TransportHard` so the
    /// sender can decide whether to requeue or terminally fail a job.
    #[error("transient transport error: {0}")]
    TransportSoft(String),

    /// A transport failure retrying will not fix (mailbox does not exist,
    /// domain rejects all mail, 5xx SMTP reply outside the soft list).
    #[error("permanent transport error: {0}")]
    TransportHard(String),

    #[error("outside permitted sending window")]
    OutOfWindow,

    #[error("stale job: {0}")]
    StaleJob(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        EngineError::Internal(err.to_string())
    }
}

impl From<lapin::Error> for EngineError {
    fn from(err: lapin::Error) -> Self {
        EngineError::Internal(format!("amqp error: {err}"))
    }
}

impl From<deadpool_lapin::PoolError> for EngineError {
    fn from(err: deadpool_lapin::PoolError) -> Self {
        EngineError::Internal(format!("amqp pool error: {err}"))
    }
}

impl EngineError {
    /// True for errors where retrying the same job later has a chance of
    /// succeeding (soft transport failures, transient internal errors).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransportSoft(_) | EngineError::Internal(_))
    }
}
