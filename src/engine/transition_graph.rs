// ==========================================
// 订单履约流程协同系统 - 流程图注册表
// ==========================================
// 职责: 按流程类型提供 {当前环节 -> 允许目标环节} 查找表、
//       角色->允许环节权限表、环节优先级 (用于回退判定)、
//       正向/反向同步查找表
// 红线: 纯查找,无状态,表即代码,进程启动后不可变
// ==========================================

use crate::domain::types::{
    ActiveCategory, ChildStatus, ProcessStage, ProcessType, RoleId, SubOrderCategory,
};

use ProcessStage::*;
use SubOrderCategory::{Manufacturing, Procurement, Shipment};

// ==========================================
// 环节优先级
// ==========================================
// 回退判定: priority(target) < priority(current) 即为回退
// 同一阶段带 (并行/单线) 共享同一优先级

/// 低于该优先级的目标环节会使生产/采购单据失效
pub const PRIORITY_BEFORE_MANUFACTURING: i32 = 20;

/// 低于该优先级的目标环节会使发货单据失效
pub const PRIORITY_BEFORE_SHIPMENT: i32 = 40;

/// 环节优先级
pub fn stage_priority(stage: ProcessStage) -> i32 {
    match stage {
        Draft => 0,
        OrderConfirmed => 10,
        InProcurement | InManufacturing | InProcurementAndManufacturing => 20,
        ProcurementCompleted | ManufacturingCompleted | ProcurementAndManufacturingCompleted => 30,
        InShipment => 40,
        ShipmentCompleted => 50,
        // 异常上报不构成回退,从任何进行中环节进入都是"向前"
        IssueReported => 55,
        Completed | Cancelled => 60,
    }
}

/// 回退到目标环节后失效的子单据类别
pub fn invalidated_categories(target: ProcessStage) -> &'static [SubOrderCategory] {
    let priority = stage_priority(target);
    if priority < PRIORITY_BEFORE_MANUFACTURING {
        &[Manufacturing, Procurement, Shipment]
    } else if priority < PRIORITY_BEFORE_SHIPMENT {
        &[Shipment]
    } else {
        &[]
    }
}

// ==========================================
// 流程图 (按流程类型)
// ==========================================
// 红线: 对枚举全覆盖 —— 每个 (类型, 环节) 都有定义;
// 终止环节与该类型不可达的环节为空集

/// 查询允许的目标环节集合
pub fn allowed_targets(process_type: ProcessType, stage: ProcessStage) -> &'static [ProcessStage] {
    match process_type {
        ProcessType::ManufacturingFlow => manufacturing_flow_targets(stage),
        ProcessType::ProcurementFlow => procurement_flow_targets(stage),
        ProcessType::HybridFlow => hybrid_flow_targets(stage),
    }
}

fn manufacturing_flow_targets(stage: ProcessStage) -> &'static [ProcessStage] {
    match stage {
        Draft => &[OrderConfirmed, Cancelled],
        OrderConfirmed => &[InManufacturing, Draft, Cancelled, IssueReported],
        InManufacturing => &[
            ManufacturingCompleted,
            OrderConfirmed,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ManufacturingCompleted => &[InShipment, InManufacturing, Draft, Cancelled, IssueReported],
        InShipment => &[
            ShipmentCompleted,
            ManufacturingCompleted,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ShipmentCompleted => &[Completed, InShipment, Draft, Cancelled, IssueReported],
        Completed => &[],
        Cancelled => &[],
        IssueReported => &[Draft, OrderConfirmed, InManufacturing, InShipment, Cancelled],
        // 本类型不可达的环节
        InProcurement
        | ProcurementCompleted
        | InProcurementAndManufacturing
        | ProcurementAndManufacturingCompleted => &[],
    }
}

fn procurement_flow_targets(stage: ProcessStage) -> &'static [ProcessStage] {
    match stage {
        Draft => &[OrderConfirmed, Cancelled],
        OrderConfirmed => &[InProcurement, Draft, Cancelled, IssueReported],
        InProcurement => &[
            ProcurementCompleted,
            OrderConfirmed,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ProcurementCompleted => &[InShipment, InProcurement, Draft, Cancelled, IssueReported],
        InShipment => &[
            ShipmentCompleted,
            ProcurementCompleted,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ShipmentCompleted => &[Completed, InShipment, Draft, Cancelled, IssueReported],
        Completed => &[],
        Cancelled => &[],
        IssueReported => &[Draft, OrderConfirmed, InProcurement, InShipment, Cancelled],
        // 本类型不可达的环节
        InManufacturing
        | ManufacturingCompleted
        | InProcurementAndManufacturing
        | ProcurementAndManufacturingCompleted => &[],
    }
}

fn hybrid_flow_targets(stage: ProcessStage) -> &'static [ProcessStage] {
    match stage {
        Draft => &[OrderConfirmed, Cancelled],
        OrderConfirmed => &[
            InProcurement,
            InManufacturing,
            InProcurementAndManufacturing,
            Draft,
            Cancelled,
            IssueReported,
        ],
        InProcurement => &[
            ProcurementCompleted,
            InProcurementAndManufacturing,
            OrderConfirmed,
            Draft,
            Cancelled,
            IssueReported,
        ],
        InManufacturing => &[
            ManufacturingCompleted,
            InProcurementAndManufacturing,
            OrderConfirmed,
            Draft,
            Cancelled,
            IssueReported,
        ],
        InProcurementAndManufacturing => &[
            ProcurementAndManufacturingCompleted,
            OrderConfirmed,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ProcurementCompleted => &[
            InShipment,
            InManufacturing,
            InProcurement,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ManufacturingCompleted => &[
            InShipment,
            InProcurement,
            InManufacturing,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ProcurementAndManufacturingCompleted => &[
            InShipment,
            InProcurementAndManufacturing,
            Draft,
            Cancelled,
            IssueReported,
        ],
        InShipment => &[
            ShipmentCompleted,
            ProcurementAndManufacturingCompleted,
            ManufacturingCompleted,
            ProcurementCompleted,
            Draft,
            Cancelled,
            IssueReported,
        ],
        ShipmentCompleted => &[Completed, InShipment, Draft, Cancelled, IssueReported],
        Completed => &[],
        Cancelled => &[],
        IssueReported => &[
            Draft,
            OrderConfirmed,
            InProcurement,
            InManufacturing,
            InProcurementAndManufacturing,
            InShipment,
            Cancelled,
        ],
    }
}

// ==========================================
// 角色权限表
// ==========================================
// 角色只收紧流程图允许的目标环节,不扩张

/// 角色允许流转到的目标环节集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePermission {
    /// 全部环节 (仅豁免权限检查,结构检查照常执行)
    All,
    /// 受限环节集合
    Stages(&'static [ProcessStage]),
}

impl RolePermission {
    pub fn allows(&self, stage: ProcessStage) -> bool {
        match self {
            RolePermission::All => true,
            RolePermission::Stages(stages) => stages.contains(&stage),
        }
    }
}

/// 查询角色权限
pub fn role_permission(role: RoleId) -> RolePermission {
    match role {
        RoleId::Admin | RoleId::GeneralManager => RolePermission::All,
        RoleId::SalesSpecialist => {
            RolePermission::Stages(&[Draft, OrderConfirmed, Cancelled, IssueReported])
        }
        RoleId::ProductionPlanner => RolePermission::Stages(&[
            InManufacturing,
            ManufacturingCompleted,
            InProcurementAndManufacturing,
            ProcurementAndManufacturingCompleted,
            IssueReported,
        ]),
        RoleId::ProcurementSpecialist => RolePermission::Stages(&[
            InProcurement,
            ProcurementCompleted,
            InProcurementAndManufacturing,
            ProcurementAndManufacturingCompleted,
            IssueReported,
        ]),
        RoleId::LogisticsSpecialist => {
            RolePermission::Stages(&[InShipment, ShipmentCompleted, Completed, IssueReported])
        }
    }
}

// ==========================================
// 当前环节类别
// ==========================================

/// (环节) -> 当前环节类别
///
/// 异常上报环节不经由本函数: 标记保留上报前的值
pub fn active_category_for(stage: ProcessStage) -> ActiveCategory {
    match stage {
        Draft | OrderConfirmed => ActiveCategory::SalesOrder,
        InProcurement | ProcurementCompleted => ActiveCategory::Procurement,
        InManufacturing | ManufacturingCompleted => ActiveCategory::Manufacturing,
        InProcurementAndManufacturing | ProcurementAndManufacturingCompleted => {
            ActiveCategory::ManufacturingAndProcurement
        }
        InShipment | ShipmentCompleted => ActiveCategory::Shipment,
        Completed | Cancelled => ActiveCategory::None,
        // 保留上报前的值,调用方不得用本函数覆盖
        IssueReported => ActiveCategory::None,
    }
}

/// 异常上报后与当前环节类别相匹配的恢复环节
///
/// 恢复环节的完整允许集合为 {草稿, 本函数返回值, 已取消}
pub fn resume_stage_for(active: ActiveCategory) -> Option<ProcessStage> {
    match active {
        ActiveCategory::None => None,
        ActiveCategory::SalesOrder => Some(OrderConfirmed),
        ActiveCategory::Manufacturing => Some(InManufacturing),
        ActiveCategory::Procurement => Some(InProcurement),
        ActiveCategory::ManufacturingAndProcurement => Some(InProcurementAndManufacturing),
        ActiveCategory::Shipment => Some(InShipment),
    }
}

// ==========================================
// 正向同步查找表
// ==========================================

/// 进入某环节后各类别子单据应同步到的目标状态
#[derive(Debug, Clone, Copy)]
pub struct StageSyncTargets {
    /// 销售单目标状态 (None 表示不触碰)
    pub sales: Option<ChildStatus>,
    /// 各可变类别的目标状态
    pub sub_orders: &'static [(SubOrderCategory, ChildStatus)],
}

/// (新环节) -> 子单据目标状态表
pub fn stage_sync_targets(stage: ProcessStage) -> StageSyncTargets {
    match stage {
        Draft => StageSyncTargets {
            sales: Some(ChildStatus::Draft),
            sub_orders: &[],
        },
        OrderConfirmed => StageSyncTargets {
            sales: Some(ChildStatus::Active),
            sub_orders: &[],
        },
        InProcurement => StageSyncTargets {
            sales: None,
            sub_orders: &[(Procurement, ChildStatus::Active)],
        },
        ProcurementCompleted => StageSyncTargets {
            sales: None,
            sub_orders: &[(Procurement, ChildStatus::Completed)],
        },
        InManufacturing => StageSyncTargets {
            sales: None,
            sub_orders: &[(Manufacturing, ChildStatus::Active)],
        },
        ManufacturingCompleted => StageSyncTargets {
            sales: None,
            sub_orders: &[(Manufacturing, ChildStatus::Completed)],
        },
        InProcurementAndManufacturing => StageSyncTargets {
            sales: None,
            sub_orders: &[
                (Manufacturing, ChildStatus::Active),
                (Procurement, ChildStatus::Active),
            ],
        },
        ProcurementAndManufacturingCompleted => StageSyncTargets {
            sales: None,
            sub_orders: &[
                (Manufacturing, ChildStatus::Completed),
                (Procurement, ChildStatus::Completed),
            ],
        },
        InShipment => StageSyncTargets {
            sales: None,
            sub_orders: &[(Shipment, ChildStatus::Active)],
        },
        ShipmentCompleted => StageSyncTargets {
            sales: None,
            sub_orders: &[(Shipment, ChildStatus::Completed)],
        },
        Completed => StageSyncTargets {
            sales: Some(ChildStatus::Completed),
            sub_orders: &[
                (Manufacturing, ChildStatus::Completed),
                (Procurement, ChildStatus::Completed),
                (Shipment, ChildStatus::Completed),
            ],
        },
        // 级联取消: 同步终态的单据不被覆盖,由仓储层过滤
        Cancelled => StageSyncTargets {
            sales: Some(ChildStatus::Cancelled),
            sub_orders: &[
                (Manufacturing, ChildStatus::Cancelled),
                (Procurement, ChildStatus::Cancelled),
                (Shipment, ChildStatus::Cancelled),
            ],
        },
        // 异常传播单独处理,不走批量同步表
        IssueReported => StageSyncTargets {
            sales: None,
            sub_orders: &[],
        },
    }
}

// ==========================================
// 反向同步: 自动推进触发表
// ==========================================

/// 子单据完成触发的自动推进
#[derive(Debug, Clone, Copy)]
pub struct AutoAdvanceTrigger {
    /// 推进目标环节
    pub target: ProcessStage,
    /// 必须全部完成的类别 (并行环节要求两个类别都完成)
    pub required: &'static [SubOrderCategory],
}

/// (完成单据的类别, 当前环节) -> 自动推进触发
pub fn auto_advance_trigger(
    category: SubOrderCategory,
    stage: ProcessStage,
) -> Option<AutoAdvanceTrigger> {
    match (category, stage) {
        (Manufacturing, InManufacturing) => Some(AutoAdvanceTrigger {
            target: ManufacturingCompleted,
            required: &[Manufacturing],
        }),
        (Procurement, InProcurement) => Some(AutoAdvanceTrigger {
            target: ProcurementCompleted,
            required: &[Procurement],
        }),
        (Manufacturing | Procurement, InProcurementAndManufacturing) => Some(AutoAdvanceTrigger {
            target: ProcurementAndManufacturingCompleted,
            required: &[Manufacturing, Procurement],
        }),
        (Shipment, InShipment) => Some(AutoAdvanceTrigger {
            target: ShipmentCompleted,
            required: &[Shipment],
        }),
        _ => None,
    }
}

// ==========================================
// 子单据工厂: 创建后隐含的推进目标
// ==========================================

/// 创建某类别子单据后隐含的目标环节 (None 表示不推进)
pub fn implied_stage_after_create(
    process_type: ProcessType,
    stage: ProcessStage,
    category: SubOrderCategory,
) -> Option<ProcessStage> {
    match category {
        Manufacturing => match stage {
            OrderConfirmed => Some(InManufacturing),
            // 混合流程: 采购进行中再开生产 -> 并行环节
            InProcurement if process_type == ProcessType::HybridFlow => {
                Some(InProcurementAndManufacturing)
            }
            ProcurementCompleted if process_type == ProcessType::HybridFlow => {
                Some(InManufacturing)
            }
            _ => None,
        },
        Procurement => match stage {
            OrderConfirmed => Some(InProcurement),
            InManufacturing if process_type == ProcessType::HybridFlow => {
                Some(InProcurementAndManufacturing)
            }
            ManufacturingCompleted if process_type == ProcessType::HybridFlow => {
                Some(InProcurement)
            }
            _ => None,
        },
        Shipment => match stage {
            ManufacturingCompleted
            | ProcurementCompleted
            | ProcurementAndManufacturingCompleted => Some(InShipment),
            _ => None,
        },
    }
}

/// 流程类型是否允许该类别的子单据
pub fn category_allowed(process_type: ProcessType, category: SubOrderCategory) -> bool {
    match (process_type, category) {
        (ProcessType::ManufacturingFlow, Procurement) => false,
        (ProcessType::ProcurementFlow, Manufacturing) => false,
        _ => true,
    }
}

/// 流程类型是否默认禁止该类别的重复单据 (force 可绕过)
///
/// 单线流程的主单据与所有流程的发货单默认一张;
/// 混合流程允许生产/采购多张并行
pub fn forbids_duplicate(process_type: ProcessType, category: SubOrderCategory) -> bool {
    match (process_type, category) {
        (ProcessType::ManufacturingFlow, Manufacturing) => true,
        (ProcessType::ProcurementFlow, Procurement) => true,
        (_, Shipment) => true,
        _ => false,
    }
}

// ==========================================
// 测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    /// 流程图对 (类型, 环节) 全覆盖: allowed_targets 对任意组合都有定义,
    /// 且每个目标环节自身也有定义 (match 全覆盖由编译器保证,这里验证闭包性)
    #[test]
    fn test_graph_total_and_closed() {
        for process_type in ProcessType::ALL {
            for stage in ProcessStage::ALL {
                let targets = allowed_targets(process_type, stage);
                for target in targets {
                    // 目标环节也必须有定义 (可能为空集)
                    let _ = allowed_targets(process_type, *target);
                }
            }
        }
    }

    /// 终止环节没有出边
    #[test]
    fn test_terminal_stages_have_no_targets() {
        for process_type in ProcessType::ALL {
            assert!(allowed_targets(process_type, Completed).is_empty());
            assert!(allowed_targets(process_type, Cancelled).is_empty());
        }
    }

    /// 单线流程不可达另一条线的环节
    #[test]
    fn test_unreachable_stages_are_empty() {
        assert!(allowed_targets(ProcessType::ManufacturingFlow, InProcurement).is_empty());
        assert!(allowed_targets(ProcessType::ProcurementFlow, InManufacturing).is_empty());
        // 且任何可达环节的目标集不包含另一条线的环节
        for stage in ProcessStage::ALL {
            let targets = allowed_targets(ProcessType::ManufacturingFlow, stage);
            assert!(!targets.contains(&InProcurement), "stage={}", stage);
            assert!(!targets.contains(&InProcurementAndManufacturing), "stage={}", stage);
        }
    }

    /// 任意进行中环节可进入异常上报,草稿与终止环节不可
    #[test]
    fn test_issue_reported_entry_points() {
        for process_type in ProcessType::ALL {
            assert!(!allowed_targets(process_type, Draft).contains(&IssueReported));
            assert!(!allowed_targets(process_type, Completed).contains(&IssueReported));
            assert!(allowed_targets(process_type, OrderConfirmed).contains(&IssueReported));
        }
        assert!(allowed_targets(ProcessType::HybridFlow, InProcurementAndManufacturing)
            .contains(&IssueReported));
    }

    /// 优先级沿主干单调递增
    #[test]
    fn test_priority_monotone_on_happy_path() {
        let path = [
            Draft,
            OrderConfirmed,
            InManufacturing,
            ManufacturingCompleted,
            InShipment,
            ShipmentCompleted,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(stage_priority(pair[0]) < stage_priority(pair[1]));
        }
    }

    /// 回退阈值: 回到草稿清空全部类别,回到生产完成只清发货
    #[test]
    fn test_invalidated_categories() {
        assert_eq!(
            invalidated_categories(Draft),
            &[Manufacturing, Procurement, Shipment]
        );
        assert_eq!(
            invalidated_categories(OrderConfirmed),
            &[Manufacturing, Procurement, Shipment]
        );
        assert_eq!(invalidated_categories(ManufacturingCompleted), &[Shipment]);
        assert_eq!(invalidated_categories(InManufacturing), &[Shipment]);
        assert!(invalidated_categories(InShipment).is_empty());
        assert!(invalidated_categories(Completed).is_empty());
    }

    /// 异常上报与恢复不会被误判为清理范围之外的回退
    #[test]
    fn test_issue_reported_is_not_rollback_from_in_progress() {
        for stage in [InProcurement, InManufacturing, InProcurementAndManufacturing, InShipment] {
            assert!(stage_priority(IssueReported) > stage_priority(stage));
        }
    }

    /// 角色只收紧不扩张: 受限角色的集合都是枚举成员 (编译期保证),
    /// 这里验证代表性角色的允许/拒绝
    #[test]
    fn test_role_permission() {
        assert!(role_permission(RoleId::Admin).allows(Completed));
        assert!(role_permission(RoleId::SalesSpecialist).allows(OrderConfirmed));
        assert!(!role_permission(RoleId::SalesSpecialist).allows(InShipment));
        assert!(role_permission(RoleId::ProductionPlanner).allows(ManufacturingCompleted));
        assert!(!role_permission(RoleId::ProductionPlanner).allows(Completed));
    }

    /// 混合流程示例: 订单确认后先开生产,再开采购,进入并行环节
    #[test]
    fn test_hybrid_parallel_entry() {
        assert_eq!(
            implied_stage_after_create(ProcessType::HybridFlow, OrderConfirmed, Manufacturing),
            Some(InManufacturing)
        );
        assert_eq!(
            implied_stage_after_create(ProcessType::HybridFlow, InManufacturing, Procurement),
            Some(InProcurementAndManufacturing)
        );
        assert!(allowed_targets(ProcessType::HybridFlow, InManufacturing)
            .contains(&InProcurementAndManufacturing));
        assert_eq!(
            active_category_for(InProcurementAndManufacturing),
            ActiveCategory::ManufacturingAndProcurement
        );
    }

    /// 并行环节的自动推进要求两个类别都完成
    #[test]
    fn test_hybrid_auto_advance_requires_both() {
        let trigger =
            auto_advance_trigger(Manufacturing, InProcurementAndManufacturing).unwrap();
        assert_eq!(trigger.target, ProcurementAndManufacturingCompleted);
        assert_eq!(trigger.required, &[Manufacturing, Procurement]);
        // 非匹配环节不触发
        assert!(auto_advance_trigger(Manufacturing, InShipment).is_none());
        assert!(auto_advance_trigger(Shipment, InManufacturing).is_none());
    }
}
