// ==========================================
// 订单履约流程协同系统 - 状态同步引擎
// ==========================================
// 正向同步: 流程环节变更 -> 子单据状态 (同一事务内)
// 反向同步: 子单据完成/异常 -> 流程可能自动推进/自动上报
// 红线: 反向同步触发的流转为咨询性,失败只记日志不上抛,
//       且绝不回滚触发它的子单据状态变更
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::SubOrder;
use crate::domain::process::Process;
use crate::domain::types::{ActiveCategory, ChildStatus, ProcessStage, SubOrderCategory};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::process_state::{ProcessStateEngine, TransitionOutcome};
use crate::engine::transition_graph::{auto_advance_trigger, resume_stage_for, stage_sync_targets};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::RepositoryError;
use crate::repository::process_repo::ProcessRepository;
use crate::repository::sales_order_repo::SalesOrderRepository;
use crate::repository::sub_order_repo::SubOrderRepository;

// ==========================================
// 正向同步 (事务内自由函数,由流程状态引擎调用)
// ==========================================

/// 正向同步: 将新环节对应的目标状态批量写到子单据上
///
/// - 同步终态 (CANCELLED / ISSUE_REPORTED) 的单据由仓储层排除
/// - 进入异常上报环节时跳过批量同步,改走异常传播
pub(crate) fn sync_forward_tx(
    tx: &Transaction,
    process: &Process,
    old_stage: ProcessStage,
    new_stage: ProcessStage,
    actor: &str,
) -> EngineResult<()> {
    let now = Utc::now().naive_utc();

    if new_stage == ProcessStage::IssueReported {
        propagate_issue_tx(tx, process, actor)?;
        return Ok(());
    }

    let targets = stage_sync_targets(new_stage);

    let mut synced = 0usize;
    if let Some(sales_target) = targets.sales {
        synced +=
            SalesOrderRepository::sync_status_tx(tx, &process.process_id, sales_target, actor, now)?;
    }
    for (category, status) in targets.sub_orders {
        synced += SubOrderRepository::sync_status_tx(
            tx,
            &process.process_id,
            *category,
            *status,
            actor,
            now,
        )?;
    }

    if new_stage == ProcessStage::Cancelled && synced > 0 {
        ActionLogRepository::insert_tx(
            tx,
            &ActionLog::record(
                Some(&process.process_id),
                ActionType::CascadeCancel,
                actor,
                Some(json!({ "cancelled": synced })),
                None,
            ),
        )?;
    }

    debug!(
        process_id = %process.process_id,
        from = %old_stage,
        to = %new_stage,
        synced = synced,
        "正向同步完成"
    );
    Ok(())
}

/// 异常传播: 仅将当前环节类别下处于执行中的单据置为异常上报
///
/// 已完成/草稿/已取消的单据不受影响
fn propagate_issue_tx(tx: &Transaction, process: &Process, actor: &str) -> EngineResult<()> {
    let now = Utc::now().naive_utc();
    let active = process.active_category;

    let mut flipped = 0usize;
    for category in active.sub_categories() {
        flipped += SubOrderRepository::set_status_where_tx(
            tx,
            &process.process_id,
            *category,
            ChildStatus::Active,
            ChildStatus::IssueReported,
            actor,
            now,
        )?;
    }
    if active.includes_sales_order() {
        flipped += SalesOrderRepository::set_status_where_tx(
            tx,
            &process.process_id,
            ChildStatus::Active,
            ChildStatus::IssueReported,
            actor,
            now,
        )?;
    }

    info!(
        process_id = %process.process_id,
        active_category = %active,
        flipped = flipped,
        "异常传播至执行中的单据"
    );
    Ok(())
}

// ==========================================
// StatusSyncEngine - 状态同步引擎
// ==========================================

/// 状态同步引擎 (反向同步与异常处理恢复的入口)
pub struct StatusSyncEngine {
    conn: Arc<Mutex<Connection>>,
    process_repo: Arc<ProcessRepository>,
    sub_order_repo: Arc<SubOrderRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    process_state: Arc<ProcessStateEngine>,
}

impl StatusSyncEngine {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        process_repo: Arc<ProcessRepository>,
        sub_order_repo: Arc<SubOrderRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        process_state: Arc<ProcessStateEngine>,
    ) -> Self {
        Self {
            conn,
            process_repo,
            sub_order_repo,
            action_log_repo,
            process_state,
        }
    }

    fn get_conn(&self) -> EngineResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::Repository(RepositoryError::LockError(e.to_string())))
    }

    // ==========================================
    // 反向同步
    // ==========================================

    /// 反向同步: 子单据状态变更入口
    ///
    /// 先在独立事务内提交子单据状态变更,落库后再执行咨询性动作:
    /// - 状态变为 COMPLETED: 该类别全部完成时尝试自动推进
    /// - 状态变为 ISSUE_REPORTED: 标记上报类别并尝试整体异常上报
    ///
    /// 咨询性动作的失败不回传,也不会回滚子单据的状态变更
    pub fn sync_reverse(
        &self,
        order_id: &str,
        new_status: ChildStatus,
        actor: &str,
    ) -> EngineResult<SubOrder> {
        // 第一事务: 提交子单据状态变更
        let (category, old_status, process_id) = {
            let conn = self.get_conn()?;
            let tx = conn
                .unchecked_transaction()
                .map_err(RepositoryError::from)?;

            let order = SubOrderRepository::find_by_id_tx(&tx, order_id)?.ok_or_else(|| {
                EngineError::NotFound {
                    entity: "SubOrder".to_string(),
                    id: order_id.to_string(),
                }
            })?;
            let old_status = order.status;

            let now = Utc::now().naive_utc();
            SubOrderRepository::update_status_tx(&tx, order_id, new_status, actor, now)?;
            ActionLogRepository::insert_tx(
                &tx,
                &ActionLog::record(
                    Some(&order.process_id),
                    ActionType::SubOrderStatus,
                    actor,
                    Some(json!({
                        "order_id": order_id,
                        "category": order.category.to_db_str(),
                        "from": old_status.to_db_str(),
                        "to": new_status.to_db_str(),
                    })),
                    None,
                ),
            )?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

            (order.category, old_status, order.process_id)
        };

        debug!(
            order_id = %order_id,
            from = %old_status,
            to = %new_status,
            "子单据状态已提交"
        );

        // 咨询性动作: 必须在子单据变更落库之后
        match new_status {
            ChildStatus::Completed => self.try_auto_advance(&process_id, category, actor),
            ChildStatus::IssueReported => self.try_escalate_issue(&process_id, category, actor),
            _ => {}
        }

        let updated =
            self.sub_order_repo
                .find_by_id(order_id)?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "SubOrder".to_string(),
                    id: order_id.to_string(),
                })?;
        Ok(updated)
    }

    /// 尝试自动推进 (咨询性,失败只记日志)
    fn try_auto_advance(&self, process_id: &str, category: SubOrderCategory, actor: &str) {
        let process = match self.process_repo.find_by_id(process_id) {
            Ok(Some(process)) => process,
            Ok(None) => return,
            Err(e) => {
                warn!(process_id = %process_id, error = %e, "自动推进前读取流程失败,忽略");
                return;
            }
        };

        let Some(trigger) = auto_advance_trigger(category, process.stage) else {
            return;
        };

        // 所需类别必须都有单据且全部完成
        for required in trigger.required {
            let complete = self
                .sub_order_repo
                .count_live(process_id, *required)
                .and_then(|live| {
                    let pending = self.sub_order_repo.count_live_not_in_status(
                        process_id,
                        *required,
                        ChildStatus::Completed,
                    )?;
                    Ok(live > 0 && pending == 0)
                });
            match complete {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        process_id = %process_id,
                        category = %required,
                        "类别尚未全部完成,不触发自动推进"
                    );
                    return;
                }
                Err(e) => {
                    warn!(process_id = %process_id, error = %e, "自动推进前置检查失败,忽略");
                    return;
                }
            }
        }

        // 咨询性流转: 结果被有意丢弃,仅记录
        match self.process_state.transition(process_id, trigger.target, actor) {
            Ok(_) => {
                info!(
                    process_id = %process_id,
                    target = %trigger.target,
                    "子单据全部完成,自动推进成功"
                );
                let log = ActionLog::record(
                    Some(process_id),
                    ActionType::AutoAdvance,
                    actor,
                    Some(json!({ "target": trigger.target.to_db_str() })),
                    None,
                );
                if let Err(e) = self.action_log_repo.insert(&log) {
                    warn!(process_id = %process_id, error = %e, "自动推进日志写入失败");
                }
            }
            Err(e) => {
                warn!(
                    process_id = %process_id,
                    target = %trigger.target,
                    error = %e,
                    "自动推进失败,忽略"
                );
            }
        }
    }

    /// 尝试异常整体上报 (咨询性,失败只记日志)
    fn try_escalate_issue(&self, process_id: &str, category: SubOrderCategory, actor: &str) {
        // 上报类别成为当前环节类别 (异常期间保留该值)
        let marked = (|| -> EngineResult<()> {
            let conn = self.get_conn()?;
            let tx = conn
                .unchecked_transaction()
                .map_err(RepositoryError::from)?;
            ProcessRepository::update_active_category_tx(
                &tx,
                process_id,
                ActiveCategory::from_sub_category(category),
                actor,
                Utc::now().naive_utc(),
            )?;
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            Ok(())
        })();
        if let Err(e) = marked {
            warn!(process_id = %process_id, error = %e, "标记异常类别失败,忽略");
            return;
        }

        // 咨询性流转: 结果被有意丢弃,仅记录
        if let Err(e) =
            self.process_state
                .transition(process_id, ProcessStage::IssueReported, actor)
        {
            warn!(
                process_id = %process_id,
                category = %category,
                error = %e,
                "异常整体上报失败,忽略"
            );
        }
    }

    // ==========================================
    // 异常处理恢复
    // ==========================================

    /// 异常处理恢复: 恢复被传播的单据并将流程流转回恢复环节
    ///
    /// 与咨询性动作不同,恢复是显式用户动作,流转失败原样上抛,
    /// 且恢复与流转在同一事务内,失败时单据状态不会半途生效
    ///
    /// # 错误
    /// - `EngineError::NotInIssueState`: 流程不处于异常上报环节
    pub fn resolve_issue(
        &self,
        process_id: &str,
        resume_stage: ProcessStage,
        actor: &str,
    ) -> EngineResult<TransitionOutcome> {
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
        if process.stage != ProcessStage::IssueReported {
            return Err(EngineError::NotInIssueState {
                stage: process.stage,
            });
        }

        // 恢复环节限定: 草稿 / 与当前环节类别匹配的进行中环节 / 已取消
        let matching = resume_stage_for(process.active_category);
        if resume_stage != ProcessStage::Draft
            && resume_stage != ProcessStage::Cancelled
            && Some(resume_stage) != matching
        {
            return Err(EngineError::Validation {
                reason: format!(
                    "异常上报只能恢复到草稿/已取消/与{}相匹配的进行中环节,不能恢复到{}",
                    process.active_category, resume_stage
                ),
            });
        }

        // 恢复当前环节类别下被传播为异常的单据
        let now = Utc::now().naive_utc();
        let active = process.active_category;
        let mut restored = 0usize;
        for category in active.sub_categories() {
            restored += SubOrderRepository::set_status_where_tx(
                &tx,
                process_id,
                *category,
                ChildStatus::IssueReported,
                ChildStatus::Active,
                actor,
                now,
            )?;
        }
        if active.includes_sales_order() {
            restored += SalesOrderRepository::set_status_where_tx(
                &tx,
                process_id,
                ChildStatus::IssueReported,
                ChildStatus::Active,
                actor,
                now,
            )?;
        }

        ActionLogRepository::insert_tx(
            &tx,
            &ActionLog::record(
                Some(process_id),
                ActionType::IssueResolve,
                actor,
                Some(json!({
                    "resume": resume_stage.to_db_str(),
                    "restored": restored,
                })),
                None,
            ),
        )?;

        // 恢复流转不吞错: 失败上抛并回滚恢复动作
        let outcome = self
            .process_state
            .transition_in_tx(&tx, process_id, resume_stage, actor)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            process_id = %process_id,
            resume = %resume_stage,
            restored = restored,
            "异常处理恢复完成"
        );
        Ok(outcome)
    }
}
