use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("playbook not found: {0}")]
    PlaybookNotFound(String),

    #[error("playbook already exists: {0}")]
    PlaybookExists(String),

    #[error("persona not found: {0}")]
    PersonaNotFound(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("mcp server not found: {0}")]
    McpServerNotFound(String),

    #[error("canvas not found: {0}")]
    CanvasNotFound(String),

    #[error("canvas already exists: {0}")]
    CanvasExists(String),

    #[error("section not found: {0}")]
    SectionNotFound(String),

    #[error("memory not found: {0}")]
    MemoryNotFound(String),

    #[error("api key not found: {0}")]
    ApiKeyNotFound(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid memory key: {0}")]
    InvalidMemoryKey(String),

    #[error("unknown permission: {0}")]
    InvalidPermission(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid session lifetime: {0}")]
    InvalidTtl(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credentials expired")]
    CredentialsExpired,

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlaybookError>;
