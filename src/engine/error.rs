// ==========================================
// 订单履约流程协同系统 - 引擎层错误类型
// ==========================================
// 红线: 每个对外错误必须点名失败的环节/类别/权限,不得泛化
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::{ProcessStage, RoleId, SubOrderCategory};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 目标环节不在当前环节的允许集合内
    #[error("无效的环节流转: from={from} to={to}")]
    InvalidTransition {
        from: ProcessStage,
        to: ProcessStage,
    },

    /// 结构前置条件不满足 (缺少必需的单据/字段)
    #[error("流转校验失败: {reason}")]
    Validation { reason: String },

    /// 角色无权流转到目标环节
    #[error("权限不足: 当前角色无权将流程流转到{stage}")]
    PermissionDenied {
        role: Option<RoleId>,
        stage: ProcessStage,
    },

    /// 幂等防重: 同类别的未删除单据已存在
    #[error("单据已存在: category={category}")]
    AlreadyExists { category: SubOrderCategory },

    /// 异常处理恢复要求流程处于异常上报环节
    #[error("流程不处于异常上报环节: 当前环节为{stage}")]
    NotInIssueState { stage: ProcessStage },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
