// ==========================================
// 订单履约流程协同系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 需要跨表原子性的写入走 *_tx(&Transaction) 关联函数,由引擎层组合
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod order_item_repo;
pub mod process_repo;
pub mod sales_order_repo;
pub mod sub_order_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_item_repo::OrderItemRepository;
pub use process_repo::ProcessRepository;
pub use sales_order_repo::SalesOrderRepository;
pub use sub_order_repo::SubOrderRepository;
