use std::fmt;

#[derive(Debug, Clone)]
pub enum LinkHubError {
    /// 短码不存在或已删除（业务层确定缺失）
    NotFound(String),
    /// 短码存在但已停用或过期（对外渲染为 404，不泄露目标）
    Inactive(String),
    /// 创建时短码冲突（随机码可重试，自定义别名需换别名）
    DuplicateCode(String),
    /// 随机码重试耗尽（理论上不可达，出现时大声记录）
    GenerationExhausted(String),
    /// 基础设施暂时不可用（可重试，不得与 NotFound 混淆）
    TransientStore(String),
    Validation(String),
    Unauthorized(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    Serialization(String),
}

impl LinkHubError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkHubError::NotFound(_) => "E001",
            LinkHubError::Inactive(_) => "E002",
            LinkHubError::DuplicateCode(_) => "E003",
            LinkHubError::GenerationExhausted(_) => "E004",
            LinkHubError::TransientStore(_) => "E005",
            LinkHubError::Validation(_) => "E006",
            LinkHubError::Unauthorized(_) => "E007",
            LinkHubError::DatabaseConfig(_) => "E008",
            LinkHubError::DatabaseConnection(_) => "E009",
            LinkHubError::DatabaseOperation(_) => "E010",
            LinkHubError::Serialization(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkHubError::NotFound(_) => "Resource Not Found",
            LinkHubError::Inactive(_) => "Link Inactive",
            LinkHubError::DuplicateCode(_) => "Duplicate Short Code",
            LinkHubError::GenerationExhausted(_) => "Code Generation Exhausted",
            LinkHubError::TransientStore(_) => "Transient Store Error",
            LinkHubError::Validation(_) => "Validation Error",
            LinkHubError::Unauthorized(_) => "Unauthorized",
            LinkHubError::DatabaseConfig(_) => "Database Configuration Error",
            LinkHubError::DatabaseConnection(_) => "Database Connection Error",
            LinkHubError::DatabaseOperation(_) => "Database Operation Error",
            LinkHubError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkHubError::NotFound(msg)
            | LinkHubError::Inactive(msg)
            | LinkHubError::DuplicateCode(msg)
            | LinkHubError::GenerationExhausted(msg)
            | LinkHubError::TransientStore(msg)
            | LinkHubError::Validation(msg)
            | LinkHubError::Unauthorized(msg)
            | LinkHubError::DatabaseConfig(msg)
            | LinkHubError::DatabaseConnection(msg)
            | LinkHubError::DatabaseOperation(msg)
            | LinkHubError::Serialization(msg) => msg,
        }
    }

    /// 是否为可重试的基础设施错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkHubError::TransientStore(_) | LinkHubError::DatabaseConnection(_)
        )
    }
}

impl fmt::Display for LinkHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for LinkHubError {}

// 便捷的构造函数
impl LinkHubError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkHubError::NotFound(msg.into())
    }

    pub fn inactive<T: Into<String>>(msg: T) -> Self {
        LinkHubError::Inactive(msg.into())
    }

    pub fn duplicate_code<T: Into<String>>(msg: T) -> Self {
        LinkHubError::DuplicateCode(msg.into())
    }

    pub fn generation_exhausted<T: Into<String>>(msg: T) -> Self {
        LinkHubError::GenerationExhausted(msg.into())
    }

    pub fn transient_store<T: Into<String>>(msg: T) -> Self {
        LinkHubError::TransientStore(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkHubError::Validation(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        LinkHubError::Unauthorized(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkHubError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkHubError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkHubError::DatabaseOperation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkHubError::Serialization(msg.into())
    }
}

impl From<sea_orm::DbErr> for LinkHubError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkHubError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for LinkHubError {
    fn from(err: std::io::Error) -> Self {
        LinkHubError::TransientStore(err.to_string())
    }
}

impl From<serde_json::Error> for LinkHubError {
    fn from(err: serde_json::Error) -> Self {
        LinkHubError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(LinkHubError::not_found("x").code(), "E001");
        assert_eq!(LinkHubError::inactive("x").code(), "E002");
        assert_eq!(LinkHubError::duplicate_code("x").code(), "E003");
        assert_eq!(LinkHubError::generation_exhausted("x").code(), "E004");
        assert_eq!(LinkHubError::transient_store("x").code(), "E005");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(LinkHubError::transient_store("pool timeout").is_retryable());
        assert!(LinkHubError::database_connection("refused").is_retryable());
        assert!(!LinkHubError::not_found("missing").is_retryable());
        assert!(!LinkHubError::duplicate_code("taken").is_retryable());
    }

    #[test]
    fn test_display_format() {
        let err = LinkHubError::duplicate_code("short code 'abc' already exists");
        assert_eq!(
            err.to_string(),
            "Duplicate Short Code: short code 'abc' already exists"
        );
    }
}
