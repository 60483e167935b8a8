// ==========================================
// 订单履约流程协同系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,转换引擎/仓储错误为用户友好的错误消息
// 红线: 每个对外错误必须点名失败的环节/类别/权限
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 流程编排错误
    // ==========================================
    #[error("无效的环节流转: from={from} to={to}")]
    InvalidTransition { from: String, to: String },

    #[error("流转校验失败: {0}")]
    ValidationError(String),

    #[error("权限不足: 当前角色无权将流程流转到{stage}")]
    PermissionDenied { stage: String },

    #[error("单据已存在: {0}")]
    AlreadyExists(String),

    #[error("流程不处于异常上报环节: 当前环节为{stage}")]
    NotInIssueState { stage: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                process_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "流程{}已被其他用户修改（期望revision={}，实际revision={}）",
                process_id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition { from, to } => ApiError::InvalidTransition {
                from: from.to_db_str().to_string(),
                to: to.to_db_str().to_string(),
            },
            EngineError::Validation { reason } => ApiError::ValidationError(reason),
            EngineError::PermissionDenied { role: _, stage } => ApiError::PermissionDenied {
                stage: stage.to_db_str().to_string(),
            },
            EngineError::AlreadyExists { category } => {
                ApiError::AlreadyExists(format!("流程已有未删除的{}单据", category))
            }
            EngineError::NotInIssueState { stage } => ApiError::NotInIssueState {
                stage: stage.to_db_str().to_string(),
            },
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
