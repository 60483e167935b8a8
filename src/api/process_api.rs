// ==========================================
// 订单履约流程协同系统 - 流程 API
// ==========================================
// 职责: 对外暴露流程编排操作,供 HTTP/UI 适配层调用
// - 创建流程 (含销售单与行项目,同一事务)
// - 环节流转 / 子单据创建 / 子单据状态上报 / 异常处理恢复
// - 可达目标环节查询 (供前端构建操作入口)
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{OrderItem, SalesOrder, SubOrder};
use crate::domain::process::Process;
use crate::domain::types::{ChildStatus, ProcessStage, ProcessType, SubOrderCategory};
use crate::engine::order_factory::{CreateSubOrderOptions, SubOrderCreation, SubOrderFactory};
use crate::engine::process_state::{ProcessStateEngine, TransitionOutcome};
use crate::engine::status_sync::StatusSyncEngine;
use crate::engine::transition_graph::active_category_for;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_item_repo::OrderItemRepository;
use crate::repository::process_repo::ProcessRepository;
use crate::repository::sales_order_repo::SalesOrderRepository;
use crate::repository::sub_order_repo::SubOrderRepository;

// ==========================================
// 请求/响应结构
// ==========================================

/// 创建流程请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProcessRequest {
    /// 流程编号 (None 时自动生成)
    pub process_no: Option<String>,
    pub process_type: ProcessType,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    /// 销售单行项目
    pub items: Vec<NewOrderItem>,
    pub remark: Option<String>,
}

/// 新建行项目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_code: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub remark: Option<String>,
}

/// 流程详情 (流程单 + 销售单 + 子单据)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    pub process: Process,
    pub sales_order: Option<SalesOrder>,
    pub sub_orders: Vec<SubOrder>,
}

// ==========================================
// ProcessApi - 流程 API
// ==========================================

/// 流程API
///
/// 职责:
/// 1. 流程创建 (流程单 + 销售单 + 行项目,一个事务)
/// 2. 编排操作的对外入口 (流转/创建子单据/上报/恢复)
/// 3. 查询 (详情/列表/可达环节/操作日志)
pub struct ProcessApi {
    conn: Arc<Mutex<Connection>>,
    process_repo: Arc<ProcessRepository>,
    sales_order_repo: Arc<SalesOrderRepository>,
    sub_order_repo: Arc<SubOrderRepository>,
    order_item_repo: Arc<OrderItemRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    process_state: Arc<ProcessStateEngine>,
    status_sync: Arc<StatusSyncEngine>,
    factory: Arc<SubOrderFactory>,
}

impl ProcessApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        process_repo: Arc<ProcessRepository>,
        sales_order_repo: Arc<SalesOrderRepository>,
        sub_order_repo: Arc<SubOrderRepository>,
        order_item_repo: Arc<OrderItemRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        process_state: Arc<ProcessStateEngine>,
        status_sync: Arc<StatusSyncEngine>,
        factory: Arc<SubOrderFactory>,
    ) -> Self {
        Self {
            conn,
            process_repo,
            sales_order_repo,
            sub_order_repo,
            order_item_repo,
            action_log_repo,
            process_state,
            status_sync,
            factory,
        }
    }

    fn get_conn(&self) -> ApiResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
    }

    // ==========================================
    // 流程创建
    // ==========================================

    /// 创建流程 (流程单 + 销售单 + 行项目在同一事务内)
    ///
    /// 初始环节为草稿,销售单状态为草稿
    pub fn create_process(
        &self,
        request: CreateProcessRequest,
        actor: &str,
    ) -> ApiResult<ProcessDetail> {
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let now = Utc::now().naive_utc();
        let process_no = request
            .process_no
            .clone()
            .unwrap_or_else(|| format!("FF-{}", &Uuid::new_v4().simple().to_string()[..8]));

        let process = Process {
            process_id: Uuid::new_v4().to_string(),
            process_no: process_no.clone(),
            process_type: request.process_type,
            stage: ProcessStage::Draft,
            active_category: active_category_for(ProcessStage::Draft),
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            remark: request.remark.clone(),
            created_by: actor.to_string(),
            created_at: now,
            updated_by: Some(actor.to_string()),
            updated_at: now,
            revision: 0,
        };

        let sales_order = SalesOrder {
            order_id: Uuid::new_v4().to_string(),
            process_id: process.process_id.clone(),
            order_no: format!("{}-SO", process_no),
            customer_id: request.customer_id.clone(),
            customer_name: request.customer_name.clone(),
            status: ChildStatus::Draft,
            deleted: false,
            created_by: actor.to_string(),
            created_at: now,
            updated_by: Some(actor.to_string()),
            updated_at: now,
        };

        let items: Vec<OrderItem> = request
            .items
            .iter()
            .map(|item| OrderItem {
                item_id: Uuid::new_v4().to_string(),
                order_id: sales_order.order_id.clone(),
                process_id: process.process_id.clone(),
                product_code: item.product_code.clone(),
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit: item.unit.clone(),
                remark: item.remark.clone(),
            })
            .collect();

        {
            let conn = self.get_conn()?;
            let tx = conn
                .unchecked_transaction()
                .map_err(RepositoryError::from)?;
            ProcessRepository::create_tx(&tx, &process)?;
            SalesOrderRepository::create_tx(&tx, &sales_order)?;
            OrderItemRepository::batch_insert_tx(&tx, &items)?;
            ActionLogRepository::insert_tx(
                &tx,
                &ActionLog::record(
                    Some(&process.process_id),
                    ActionType::CreateProcess,
                    actor,
                    Some(json!({
                        "process_no": process_no,
                        "process_type": process.process_type.to_db_str(),
                        "items": items.len(),
                    })),
                    None,
                ),
            )?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        }

        info!(
            process_id = %process.process_id,
            process_no = %process_no,
            process_type = %process.process_type,
            "流程创建完成"
        );

        Ok(ProcessDetail {
            process,
            sales_order: Some(sales_order),
            sub_orders: Vec::new(),
        })
    }

    // ==========================================
    // 编排操作
    // ==========================================

    /// 请求一次环节流转
    pub fn transition(
        &self,
        process_id: &str,
        target: ProcessStage,
        actor: &str,
    ) -> ApiResult<TransitionOutcome> {
        let outcome = self.process_state.transition(process_id, target, actor)?;
        Ok(outcome)
    }

    /// 创建子单据
    pub fn create_sub_order(
        &self,
        process_id: &str,
        category: SubOrderCategory,
        actor: &str,
        options: CreateSubOrderOptions,
    ) -> ApiResult<SubOrderCreation> {
        let creation = self
            .factory
            .create_sub_order(process_id, category, actor, options)?;
        Ok(creation)
    }

    /// 上报子单据状态变更 (反向同步入口)
    ///
    /// 子单据完成可能触发流程自动推进,异常上报可能触发流程整体上报;
    /// 这两类动作为咨询性,失败不影响本次状态变更
    pub fn update_sub_order_status(
        &self,
        order_id: &str,
        new_status: ChildStatus,
        actor: &str,
    ) -> ApiResult<SubOrder> {
        let order = self.status_sync.sync_reverse(order_id, new_status, actor)?;
        Ok(order)
    }

    /// 异常处理恢复
    pub fn resolve_issue(
        &self,
        process_id: &str,
        resume_stage: ProcessStage,
        actor: &str,
    ) -> ApiResult<TransitionOutcome> {
        let outcome = self
            .status_sync
            .resolve_issue(process_id, resume_stage, actor)?;
        Ok(outcome)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询流程详情 (流程单 + 销售单 + 未删除子单据)
    pub fn get_process(&self, process_id: &str) -> ApiResult<ProcessDetail> {
        let process = self
            .process_repo
            .find_by_id(process_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Process(id={})不存在", process_id)))?;
        let sales_order = self.sales_order_repo.find_by_process(process_id)?;
        let sub_orders = self.sub_order_repo.find_by_process(process_id)?;

        debug!(
            process_id = %process_id,
            stage = %process.stage,
            sub_orders = sub_orders.len(),
            "查询流程详情"
        );

        Ok(ProcessDetail {
            process,
            sales_order,
            sub_orders,
        })
    }

    /// 查询流程列表 (按创建时间倒序)
    pub fn list_processes(&self, limit: i64, offset: i64) -> ApiResult<Vec<Process>> {
        if limit <= 0 {
            return Err(ApiError::InvalidInput("limit必须大于0".to_string()));
        }
        let processes = self.process_repo.list_all(limit, offset)?;
        Ok(processes)
    }

    /// 查询某用户在当前流程上可发起的目标环节 (流程图 ∩ 角色权限,按优先级排序)
    pub fn allowed_target_stages(
        &self,
        process_id: &str,
        actor: &str,
    ) -> ApiResult<Vec<ProcessStage>> {
        let process = self
            .process_repo
            .find_by_id(process_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Process(id={})不存在", process_id)))?;
        Ok(self.process_state.allowed_target_stages(&process, actor))
    }

    /// 查询单据行项目
    pub fn list_order_items(&self, order_id: &str) -> ApiResult<Vec<OrderItem>> {
        let items = self.order_item_repo.find_by_order(order_id)?;
        Ok(items)
    }

    /// 查询流程操作日志 (时间倒序)
    pub fn list_action_logs(&self, process_id: &str) -> ApiResult<Vec<ActionLog>> {
        let logs = self.action_log_repo.find_by_process(process_id)?;
        Ok(logs)
    }
}
