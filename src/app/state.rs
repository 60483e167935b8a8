// ==========================================
// 订单履约流程协同系统 - 应用状态
// ==========================================
// 职责: 装配共享连接、仓储、引擎与 API 实例
// 适配层 (HTTP/UI) 持有 AppState 即可使用全部能力
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ProcessApi;
use crate::db;
use crate::engine::{
    ProcessStateEngine, RoleDirectory, StatusSyncEngine, SubOrderFactory, TransitionValidator,
};
use crate::repository::{
    ActionLogRepository, OrderItemRepository, ProcessRepository, SalesOrderRepository,
    SubOrderRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 流程API
    pub process_api: Arc<ProcessApi>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - role_directory: 角色查询实现 (认证系统适配器或内存角色表)
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享数据库连接并初始化 schema
    /// 2. 初始化所有Repository
    /// 3. 初始化引擎 (校验器/状态引擎/同步引擎/子单据工厂)
    /// 4. 创建API实例
    pub fn new(
        db_path: String,
        role_directory: Arc<dyn RoleDirectory>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        db::init_schema(&conn).map_err(|e| format!("无法初始化schema: {}", e))?;
        match db::read_schema_version(&conn) {
            Ok(Some(version)) if version != db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    "schema_version={} 与期望的 {} 不一致(将继续启动)",
                    version,
                    db::CURRENT_SCHEMA_VERSION
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("schema_version 读取失败(将继续启动): {}", e),
        }
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let process_repo = Arc::new(ProcessRepository::new(conn.clone()));
        let sales_order_repo = Arc::new(SalesOrderRepository::new(conn.clone()));
        let sub_order_repo = Arc::new(SubOrderRepository::new(conn.clone()));
        let order_item_repo = Arc::new(OrderItemRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // ==========================================
        // 初始化引擎层
        // ==========================================
        let validator = Arc::new(TransitionValidator::new(role_directory));
        let process_state = Arc::new(ProcessStateEngine::new(conn.clone(), validator));
        let status_sync = Arc::new(StatusSyncEngine::new(
            conn.clone(),
            process_repo.clone(),
            sub_order_repo.clone(),
            action_log_repo.clone(),
            process_state.clone(),
        ));
        let factory = Arc::new(SubOrderFactory::new(conn.clone(), process_state.clone()));

        // ==========================================
        // 创建API实例
        // ==========================================
        let process_api = Arc::new(ProcessApi::new(
            conn,
            process_repo,
            sales_order_repo,
            sub_order_repo,
            order_item_repo,
            action_log_repo.clone(),
            process_state,
            status_sync,
            factory,
        ));

        tracing::info!("AppState初始化成功");

        Ok(Self {
            db_path,
            process_api,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先使用系统数据目录,不可用时退回当前目录
pub fn get_default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    let dir = base.join("fulfillment-flow");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!("创建数据目录失败(退回当前目录): {}", e);
        return "fulfillment.db".to_string();
    }
    dir.join("fulfillment.db").to_string_lossy().to_string()
}
