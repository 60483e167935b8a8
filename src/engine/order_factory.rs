// ==========================================
// 订单履约流程协同系统 - 子单据工厂
// ==========================================
// 职责: 在既有流程下幂等创建子单据,复制销售单行项目,
//       可选地在创建后立即推进流程环节
// 红线: 创建与推进在同一事务内,推进失败则创建一并回滚
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::SubOrder;
use crate::domain::types::{ChildStatus, SubOrderCategory};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::process_state::{ProcessStateEngine, TransitionOutcome};
use crate::engine::transition_graph::{
    category_allowed, forbids_duplicate, implied_stage_after_create,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::order_item_repo::OrderItemRepository;
use crate::repository::process_repo::ProcessRepository;
use crate::repository::sales_order_repo::SalesOrderRepository;
use crate::repository::sub_order_repo::SubOrderRepository;

// ==========================================
// 创建选项
// ==========================================

/// 子单据创建选项
#[derive(Debug, Clone)]
pub struct CreateSubOrderOptions {
    /// 单据编号 (None 时按流程编号自动生成)
    pub order_no: Option<String>,
    /// 备注
    pub remark: Option<String>,
    /// 是否复制销售单行项目 (默认复制)
    pub copy_items: bool,
    /// 绕过幂等防重 (默认不绕过)
    pub force: bool,
    /// 创建后立即推进流程环节 (默认不推进;失败会上抛并回滚创建)
    pub auto_advance: bool,
}

impl Default for CreateSubOrderOptions {
    fn default() -> Self {
        Self {
            order_no: None,
            remark: None,
            copy_items: true,
            force: false,
            auto_advance: false,
        }
    }
}

/// 一次创建的完整结果
#[derive(Debug, Clone)]
pub struct SubOrderCreation {
    /// 创建的子单据 (若发生推进,状态为正向同步后的值)
    pub order: SubOrder,
    /// 复制的行项目数
    pub copied_items: usize,
    /// auto_advance 触发的流转结果
    pub transition: Option<TransitionOutcome>,
}

// ==========================================
// SubOrderFactory - 子单据工厂
// ==========================================

/// 子单据工厂
pub struct SubOrderFactory {
    conn: Arc<Mutex<Connection>>,
    process_state: Arc<ProcessStateEngine>,
}

impl SubOrderFactory {
    pub fn new(conn: Arc<Mutex<Connection>>, process_state: Arc<ProcessStateEngine>) -> Self {
        Self {
            conn,
            process_state,
        }
    }

    fn get_conn(&self) -> EngineResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 创建子单据
    ///
    /// # 参数
    /// - process_id: 所属流程
    /// - category: 子单据类别 (销售单不经由工厂创建)
    /// - actor: 操作人
    /// - options: 创建选项
    ///
    /// # 错误
    /// - `EngineError::Validation`: 流程类型不支持该类别/流程已终止/销售单缺失
    /// - `EngineError::AlreadyExists`: 幂等防重 (force 可绕过)
    /// - auto_advance 触发的流转失败原样上抛,创建一并回滚
    pub fn create_sub_order(
        &self,
        process_id: &str,
        category: SubOrderCategory,
        actor: &str,
        options: CreateSubOrderOptions,
    ) -> EngineResult<SubOrderCreation> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;

        let process =
            ProcessRepository::find_by_id_tx(&tx, process_id)?.ok_or_else(|| {
                EngineError::NotFound {
                    entity: "Process".to_string(),
                    id: process_id.to_string(),
                }
            })?;

        // 类别兼容性: 单线流程不挂另一条线的单据
        if !category_allowed(process.process_type, category) {
            return Err(EngineError::Validation {
                reason: format!(
                    "流程类型{}不支持创建{}单据",
                    process.process_type, category
                ),
            });
        }
        if process.is_terminal() {
            return Err(EngineError::Validation {
                reason: format!("流程{}已终止,不能创建子单据", process.process_no),
            });
        }

        // 幂等防重
        if !options.force && forbids_duplicate(process.process_type, category) {
            let live = SubOrderRepository::count_live_tx(&tx, process_id, category)?;
            if live > 0 {
                return Err(EngineError::AlreadyExists { category });
            }
        }

        let sales = SalesOrderRepository::find_by_process_tx(&tx, process_id)?.ok_or_else(
            || EngineError::Validation {
                reason: format!("流程{}缺少销售单,无法复制行项目", process.process_no),
            },
        )?;

        let now = Utc::now().naive_utc();
        let order = SubOrder {
            order_id: Uuid::new_v4().to_string(),
            process_id: process_id.to_string(),
            category,
            order_no: options
                .order_no
                .clone()
                .unwrap_or_else(|| generate_order_no(&process.process_no, category)),
            status: ChildStatus::Draft,
            deleted: false,
            remark: options.remark.clone(),
            created_by: actor.to_string(),
            created_at: now,
            updated_by: Some(actor.to_string()),
            updated_at: now,
        };
        SubOrderRepository::create_tx(&tx, &order)?;

        // 行项目整体复制 (批量,不做增量)
        let copied_items = if options.copy_items {
            OrderItemRepository::copy_items_tx(&tx, &sales.order_id, &order.order_id, process_id)?
        } else {
            0
        };

        ActionLogRepository::insert_tx(
            &tx,
            &ActionLog::record(
                Some(process_id),
                ActionType::CreateSubOrder,
                actor,
                Some(json!({
                    "order_id": order.order_id,
                    "category": category.to_db_str(),
                    "order_no": order.order_no,
                    "copied_items": copied_items,
                    "force": options.force,
                })),
                None,
            ),
        )?;

        // 请求式推进: 与咨询性自动推进不同,失败上抛
        let transition = if options.auto_advance {
            match implied_stage_after_create(process.process_type, process.stage, category) {
                Some(target) => {
                    debug!(
                        process_id = %process_id,
                        category = %category,
                        target = %target,
                        "创建后推进流程环节"
                    );
                    Some(
                        self.process_state
                            .transition_in_tx(&tx, process_id, target, actor)?,
                    )
                }
                None => None,
            }
        } else {
            None
        };

        // 推进的正向同步可能已改写单据状态,提交前回读
        let order = SubOrderRepository::find_by_id_tx(&tx, &order.order_id)?.ok_or_else(
            || EngineError::NotFound {
                entity: "SubOrder".to_string(),
                id: order.order_id.clone(),
            },
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            process_id = %process_id,
            order_id = %order.order_id,
            category = %category,
            copied_items = copied_items,
            advanced = transition.is_some(),
            "子单据创建完成"
        );

        Ok(SubOrderCreation {
            order,
            copied_items,
            transition,
        })
    }
}

/// 按流程编号生成子单据编号
fn generate_order_no(process_no: &str, category: SubOrderCategory) -> String {
    let prefix = match category {
        SubOrderCategory::Manufacturing => "MO",
        SubOrderCategory::Procurement => "PO",
        SubOrderCategory::Shipment => "SH",
    };
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", process_no, prefix, &uuid[..8])
}
