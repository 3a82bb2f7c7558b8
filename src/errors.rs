use diesel::result::Error as DieselError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Diesel error: {0}")]
    DieselError(#[from] DieselError),
    #[error("Pool error: {0}")]
    PoolError(#[from] diesel::r2d2::PoolError),
    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}
