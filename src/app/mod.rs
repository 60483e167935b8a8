// ==========================================
// 订单履约流程协同系统 - 应用层
// ==========================================
// 职责: 应用装配 (组合根)
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
