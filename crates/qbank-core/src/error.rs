use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Question not found: {0}")]
    QuestionNotFound(uuid::Uuid),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),

    #[error("Invalid question type: {0}")]
    InvalidQuestionType(String),

    #[error("Corrupt stored record {id}: {message}")]
    CorruptRecord { id: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
