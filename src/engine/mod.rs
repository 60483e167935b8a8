// ==========================================
// 订单履约流程协同系统 - 引擎层
// ==========================================
// 职责: 流程编排核心 —— 流程图注册表、流转校验器、
//       流程状态引擎、状态同步引擎、子单据工厂
// ==========================================

pub mod error;
pub mod order_factory;
pub mod process_state;
pub mod status_sync;
pub mod transition_graph;
pub mod validator;

// 重导出核心类型
pub use error::{EngineError, EngineResult};
pub use order_factory::{CreateSubOrderOptions, SubOrderCreation, SubOrderFactory};
pub use process_state::{ProcessStateEngine, RollbackCleanup, TransitionOutcome};
pub use status_sync::StatusSyncEngine;
pub use transition_graph::RolePermission;
pub use validator::{RoleDirectory, StaticRoleDirectory, TransitionValidator};
