// ==========================================
// 订单履约流程协同系统 - 流程状态引擎
// ==========================================
// 职责: 环节流转的事务入口
// 步骤: 流程图检查 -> 校验器 -> 回退清理 -> 环节与时间戳变更 ->
//       正向同步 -> 操作日志,全部在同一事务内提交
// 并发控制: revision 条件更新,冲突返回 OptimisticLockFailure
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde_json::json;
use tracing::{debug, info};

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::process::Process;
use crate::domain::types::{ProcessStage, SubOrderCategory};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::status_sync::sync_forward_tx;
use crate::engine::transition_graph::{
    active_category_for, allowed_targets, invalidated_categories, stage_priority,
};
use crate::engine::validator::TransitionValidator;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::process_repo::ProcessRepository;
use crate::repository::sub_order_repo::SubOrderRepository;

// ==========================================
// 流转结果
// ==========================================

/// 回退清理计数 (侧信道结果,供调用方提示,不落库)
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackCleanup {
    pub manufacturing: usize, // 被删除的生产单数
    pub procurement: usize,   // 被删除的采购单数
    pub shipment: usize,      // 被删除的发货单数
}

impl RollbackCleanup {
    fn record(&mut self, category: SubOrderCategory, count: usize) {
        match category {
            SubOrderCategory::Manufacturing => self.manufacturing += count,
            SubOrderCategory::Procurement => self.procurement += count,
            SubOrderCategory::Shipment => self.shipment += count,
        }
    }

    pub fn total(&self) -> usize {
        self.manufacturing + self.procurement + self.shipment
    }
}

/// 一次流转的完整结果
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// 更新后的流程单
    pub process: Process,
    /// 回退清理计数 (非回退流转为全零)
    pub cleanup: RollbackCleanup,
}

// ==========================================
// ProcessStateEngine - 流程状态引擎
// ==========================================

/// 流程状态引擎
///
/// 所有流转在单一事务内执行: 校验失败零副作用,
/// 校验通过后的任何失败整体回滚
pub struct ProcessStateEngine {
    conn: Arc<Mutex<Connection>>,
    validator: Arc<TransitionValidator>,
}

impl ProcessStateEngine {
    pub fn new(conn: Arc<Mutex<Connection>>, validator: Arc<TransitionValidator>) -> Self {
        Self { conn, validator }
    }

    fn get_conn(&self) -> EngineResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Repository(RepositoryError::LockError(e.to_string())))
    }

    /// 请求一次环节流转
    ///
    /// # 参数
    /// - process_id: 流程ID
    /// - target: 目标环节
    /// - actor: 操作人
    ///
    /// # 错误
    /// - `EngineError::InvalidTransition`: 目标环节不在允许集合内
    /// - `EngineError::Validation` / `EngineError::PermissionDenied`: 校验失败
    /// - `RepositoryError::OptimisticLockFailure`: 并发流转冲突
    pub fn transition(
        &self,
        process_id: &str,
        target: ProcessStage,
        actor: &str,
    ) -> EngineResult<TransitionOutcome> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(RepositoryError::from)?;
        let outcome = self.transition_in_tx(&tx, process_id, target, actor)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(outcome)
    }

    /// 在调用方事务中执行流转 (异常处理恢复与子单据工厂复用)
    pub(crate) fn transition_in_tx(
        &self,
        tx: &Transaction,
        process_id: &str,
        target: ProcessStage,
        actor: &str,
    ) -> EngineResult<TransitionOutcome> {
        let mut process =
            ProcessRepository::find_by_id_tx(tx, process_id)?.ok_or_else(|| {
                EngineError::NotFound {
                    entity: "Process".to_string(),
                    id: process_id.to_string(),
                }
            })?;
        let old_stage = process.stage;

        // ==========================================
        // 步骤1: 流程图检查
        // ==========================================
        if !allowed_targets(process.process_type, old_stage).contains(&target) {
            return Err(EngineError::InvalidTransition {
                from: old_stage,
                to: target,
            });
        }

        // ==========================================
        // 步骤2: 结构校验 + 权限校验
        // ==========================================
        self.validator.validate_tx(tx, &process, target, actor)?;

        let now = Utc::now().naive_utc();

        // ==========================================
        // 步骤3: 回退清理 (先于正向同步执行)
        // ==========================================
        let mut cleanup = RollbackCleanup::default();
        if stage_priority(target) < stage_priority(old_stage) {
            for category in invalidated_categories(target) {
                let count = SubOrderRepository::soft_delete_by_category_tx(
                    tx,
                    process_id,
                    *category,
                    actor,
                    now,
                )?;
                cleanup.record(*category, count);
            }
            if cleanup.total() > 0 {
                info!(
                    process_id = %process_id,
                    from = %old_stage,
                    to = %target,
                    removed = cleanup.total(),
                    "回退清理已失效的下游单据"
                );
                ActionLogRepository::insert_tx(
                    tx,
                    &ActionLog::record(
                        Some(process_id),
                        ActionType::RollbackCleanup,
                        actor,
                        Some(json!({
                            "from": old_stage.to_db_str(),
                            "to": target.to_db_str(),
                            "manufacturing": cleanup.manufacturing,
                            "procurement": cleanup.procurement,
                            "shipment": cleanup.shipment,
                        })),
                        None,
                    ),
                )?;
            }
        }

        // ==========================================
        // 步骤4: 环节/时间戳/审计字段变更 (乐观锁)
        // ==========================================
        process.stage = target;
        // 异常上报保留上报前的当前环节类别
        if target != ProcessStage::IssueReported {
            process.active_category = active_category_for(target);
        }
        match target {
            ProcessStage::OrderConfirmed => process.confirmed_at = Some(now),
            ProcessStage::Completed => process.completed_at = Some(now),
            ProcessStage::Cancelled => process.cancelled_at = Some(now),
            _ => {}
        }
        // 回退到订单确认之前,确认时间戳随之失效
        if stage_priority(target) < stage_priority(ProcessStage::OrderConfirmed) {
            process.confirmed_at = None;
        }
        process.updated_by = Some(actor.to_string());
        process.updated_at = now;

        let expected_revision = process.revision;
        ProcessRepository::update_stage_tx(tx, &process, expected_revision)?;
        process.revision += 1;

        // ==========================================
        // 步骤5: 正向同步子单据
        // ==========================================
        sync_forward_tx(tx, &process, old_stage, target, actor)?;

        ActionLogRepository::insert_tx(
            tx,
            &ActionLog::record(
                Some(process_id),
                ActionType::StageTransition,
                actor,
                Some(json!({
                    "from": old_stage.to_db_str(),
                    "to": target.to_db_str(),
                })),
                None,
            ),
        )?;

        debug!(
            process_id = %process_id,
            from = %old_stage,
            to = %target,
            actor = %actor,
            "环节流转完成"
        );

        Ok(TransitionOutcome { process, cleanup })
    }

    /// 计算某用户在当前流程上可发起的目标环节
    pub fn allowed_target_stages(&self, process: &Process, actor: &str) -> Vec<ProcessStage> {
        self.validator.allowed_target_stages(process, actor)
    }
}
