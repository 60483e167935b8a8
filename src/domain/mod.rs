// ==========================================
// 订单履约流程协同系统 - 领域层
// ==========================================
// 职责: 实体与闭集类型定义,不含持久化与业务规则
// ==========================================

pub mod action_log;
pub mod order;
pub mod process;
pub mod types;

// 重导出核心实体
pub use action_log::{ActionLog, ActionType};
pub use order::{OrderItem, SalesOrder, SubOrder};
pub use process::Process;
