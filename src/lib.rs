// ==========================================
// 订单履约流程协同系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 多环节业务履约流程的编排核心
// - 按流程类型的环节流转图与角色权限门禁
// - 流程与子单据 (销售/生产/采购/发货) 的双向状态同步
// - 回退触发的下游单据清理与子单据完成触发的自动推进
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 流程编排核心
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA/schema 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActiveCategory, ChildStatus, ProcessStage, ProcessType, RoleId, SubOrderCategory,
};

// 领域实体
pub use domain::{ActionLog, ActionType, OrderItem, Process, SalesOrder, SubOrder};

// 引擎
pub use engine::{
    CreateSubOrderOptions, EngineError, EngineResult, ProcessStateEngine, RoleDirectory,
    RollbackCleanup, StaticRoleDirectory, StatusSyncEngine, SubOrderCreation, SubOrderFactory,
    TransitionOutcome, TransitionValidator,
};

// API
pub use api::{ApiError, ApiResult, ProcessApi};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }
}
