// ==========================================
// 订单履约流程协同系统 - 流转校验器
// ==========================================
// 职责: 环节流转的结构前置条件校验 + 角色权限校验
// 红线: 两项校验对每次流转无条件执行;
//       管理员只豁免权限校验,结构校验照常执行
// ==========================================

use std::collections::HashMap;
use std::sync::Arc;

use rusqlite::Transaction;
use tracing::debug;

use crate::domain::process::Process;
use crate::domain::types::{ChildStatus, ProcessStage, RoleId, SubOrderCategory};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::transition_graph::{allowed_targets, role_permission, stage_priority};
use crate::repository::sales_order_repo::SalesOrderRepository;
use crate::repository::sub_order_repo::SubOrderRepository;

// ==========================================
// RoleDirectory - 角色查询接口
// ==========================================

/// 角色查询 (认证系统的窄接口)
pub trait RoleDirectory: Send + Sync {
    /// 用户 -> 角色 (None 表示未分配角色)
    fn role_of(&self, user: &str) -> Option<RoleId>;
}

/// 内存角色表实现
///
/// 用于应用装配与测试; 生产部署可替换为认证系统适配器
pub struct StaticRoleDirectory {
    roles: HashMap<String, RoleId>,
}

impl StaticRoleDirectory {
    pub fn new() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    /// 批量装入用户角色
    pub fn from_pairs(pairs: &[(&str, RoleId)]) -> Self {
        let mut directory = Self::new();
        for (user, role) in pairs {
            directory.assign(user, *role);
        }
        directory
    }

    /// 分配角色
    pub fn assign(&mut self, user: &str, role: RoleId) {
        self.roles.insert(user.to_string(), role);
    }
}

impl Default for StaticRoleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn role_of(&self, user: &str) -> Option<RoleId> {
        self.roles.get(user).copied()
    }
}

// ==========================================
// TransitionValidator - 流转校验器
// ==========================================

/// 流转校验器
///
/// 职责:
/// 1. 结构校验: 按目标环节分派,确认必需的关联单据存在
/// 2. 权限校验: 角色只收紧流程图允许的集合,不扩张
pub struct TransitionValidator {
    role_directory: Arc<dyn RoleDirectory>,
}

impl TransitionValidator {
    pub fn new(role_directory: Arc<dyn RoleDirectory>) -> Self {
        Self { role_directory }
    }

    /// 校验一次流转请求
    ///
    /// # 参数
    /// - tx: 所属原子事务 (与流转共用同一快照)
    /// - process: 流程单
    /// - target: 目标环节
    /// - actor: 操作人
    ///
    /// # 错误
    /// - `EngineError::Validation`: 结构前置条件不满足,消息点名缺失的单据/字段
    /// - `EngineError::PermissionDenied`: 角色无权流转到目标环节
    pub fn validate_tx(
        &self,
        tx: &Transaction,
        process: &Process,
        target: ProcessStage,
        actor: &str,
    ) -> EngineResult<()> {
        self.check_structural(tx, process, target)?;
        self.check_permission(target, actor)?;
        Ok(())
    }

    // ==========================================
    // 结构校验
    // ==========================================

    fn check_structural(
        &self,
        tx: &Transaction,
        process: &Process,
        target: ProcessStage,
    ) -> EngineResult<()> {
        match target {
            ProcessStage::OrderConfirmed => {
                let sales = SalesOrderRepository::find_by_process_tx(tx, &process.process_id)?
                    .ok_or_else(|| EngineError::Validation {
                        reason: format!("流程{}缺少销售单,无法确认订单", process.process_no),
                    })?;
                if !sales.has_customer_account() {
                    return Err(EngineError::Validation {
                        reason: format!("销售单{}未挂接客户账户,无法确认订单", sales.order_no),
                    });
                }
            }
            ProcessStage::ManufacturingCompleted => {
                self.require_live_sub_order(tx, process, SubOrderCategory::Manufacturing)?;
            }
            ProcessStage::ProcurementCompleted => {
                self.require_live_sub_order(tx, process, SubOrderCategory::Procurement)?;
            }
            ProcessStage::ProcurementAndManufacturingCompleted => {
                self.require_live_sub_order(tx, process, SubOrderCategory::Manufacturing)?;
                self.require_live_sub_order(tx, process, SubOrderCategory::Procurement)?;
            }
            ProcessStage::ShipmentCompleted => {
                self.require_live_sub_order(tx, process, SubOrderCategory::Shipment)?;
            }
            ProcessStage::Completed => {
                let pending = SubOrderRepository::count_live_not_in_status_tx(
                    tx,
                    &process.process_id,
                    SubOrderCategory::Shipment,
                    ChildStatus::Completed,
                )?;
                if pending > 0 {
                    return Err(EngineError::Validation {
                        reason: format!(
                            "仍有{}张发货单未完成,流程不能结案",
                            pending
                        ),
                    });
                }
            }
            // 其余目标环节无结构前置条件
            _ => {}
        }
        Ok(())
    }

    fn require_live_sub_order(
        &self,
        tx: &Transaction,
        process: &Process,
        category: SubOrderCategory,
    ) -> EngineResult<()> {
        let count = SubOrderRepository::count_live_tx(tx, &process.process_id, category)?;
        if count == 0 {
            return Err(EngineError::Validation {
                reason: format!(
                    "流程{}没有未删除的{}单据,不满足完成条件",
                    process.process_no,
                    category
                ),
            });
        }
        Ok(())
    }

    // ==========================================
    // 权限校验
    // ==========================================

    fn check_permission(&self, target: ProcessStage, actor: &str) -> EngineResult<()> {
        let role = self.role_directory.role_of(actor);
        let Some(role) = role else {
            debug!(actor = %actor, target = %target, "操作人未分配角色,拒绝流转");
            return Err(EngineError::PermissionDenied {
                role: None,
                stage: target,
            });
        };

        if !role_permission(role).allows(target) {
            return Err(EngineError::PermissionDenied {
                role: Some(role),
                stage: target,
            });
        }
        Ok(())
    }

    // ==========================================
    // UI 辅助: 可达目标环节
    // ==========================================

    /// 计算某用户在当前流程上可发起的目标环节 (流程图 ∩ 角色权限)
    ///
    /// 返回按环节优先级升序排序的有序集合,供前端构建操作入口
    pub fn allowed_target_stages(&self, process: &Process, actor: &str) -> Vec<ProcessStage> {
        let Some(role) = self.role_directory.role_of(actor) else {
            return Vec::new();
        };
        let permission = role_permission(role);

        let mut stages: Vec<ProcessStage> =
            allowed_targets(process.process_type, process.stage)
                .iter()
                .copied()
                .filter(|stage| permission.allows(*stage))
                .collect();
        stages.sort_by_key(|stage| (stage_priority(*stage), stage.to_db_str()));
        stages
    }
}
