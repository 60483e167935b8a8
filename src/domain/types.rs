// ==========================================
// 订单履约流程协同系统 - 领域类型定义
// ==========================================
// 闭集枚举: 流程类型 / 流程环节 / 单据状态 / 单据类别 / 角色
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 流程类型 (Process Type)
// ==========================================
// 决定流程图中存在哪些中间环节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessType {
    ManufacturingFlow, // 生产流程 (仅生产)
    ProcurementFlow,   // 采购流程 (仅采购)
    HybridFlow,        // 混合流程 (生产+采购)
}

impl ProcessType {
    /// 全部流程类型 (用于遍历校验)
    pub const ALL: [ProcessType; 3] = [
        ProcessType::ManufacturingFlow,
        ProcessType::ProcurementFlow,
        ProcessType::HybridFlow,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcessType::ManufacturingFlow => "MANUFACTURING_FLOW",
            ProcessType::ProcurementFlow => "PROCUREMENT_FLOW",
            ProcessType::HybridFlow => "HYBRID_FLOW",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "MANUFACTURING_FLOW" => Some(ProcessType::ManufacturingFlow),
            "PROCUREMENT_FLOW" => Some(ProcessType::ProcurementFlow),
            "HYBRID_FLOW" => Some(ProcessType::HybridFlow),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 流程环节 (Process Stage)
// ==========================================
// 流程单在其类型对应流程图中的当前位置
// 红线: 所有环节必须在流程图中有定义 (终止环节为空集)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStage {
    Draft,                                // 草稿
    OrderConfirmed,                       // 订单已确认
    InProcurement,                        // 采购中
    ProcurementCompleted,                 // 采购完成
    InManufacturing,                      // 生产中
    ManufacturingCompleted,               // 生产完成
    InProcurementAndManufacturing,        // 采购与生产并行中
    ProcurementAndManufacturingCompleted, // 采购与生产完成
    InShipment,                           // 发货中
    ShipmentCompleted,                    // 发货完成
    Completed,                            // 已完成
    Cancelled,                            // 已取消
    IssueReported,                        // 异常上报
}

impl ProcessStage {
    /// 全部环节 (用于流程图全覆盖校验)
    pub const ALL: [ProcessStage; 13] = [
        ProcessStage::Draft,
        ProcessStage::OrderConfirmed,
        ProcessStage::InProcurement,
        ProcessStage::ProcurementCompleted,
        ProcessStage::InManufacturing,
        ProcessStage::ManufacturingCompleted,
        ProcessStage::InProcurementAndManufacturing,
        ProcessStage::ProcurementAndManufacturingCompleted,
        ProcessStage::InShipment,
        ProcessStage::ShipmentCompleted,
        ProcessStage::Completed,
        ProcessStage::Cancelled,
        ProcessStage::IssueReported,
    ];

    /// 终止环节 (不再有出边)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStage::Completed | ProcessStage::Cancelled)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProcessStage::Draft => "DRAFT",
            ProcessStage::OrderConfirmed => "ORDER_CONFIRMED",
            ProcessStage::InProcurement => "IN_PROCUREMENT",
            ProcessStage::ProcurementCompleted => "PROCUREMENT_COMPLETED",
            ProcessStage::InManufacturing => "IN_MANUFACTURING",
            ProcessStage::ManufacturingCompleted => "MANUFACTURING_COMPLETED",
            ProcessStage::InProcurementAndManufacturing => "IN_PROCUREMENT_AND_MANUFACTURING",
            ProcessStage::ProcurementAndManufacturingCompleted => {
                "PROCUREMENT_AND_MANUFACTURING_COMPLETED"
            }
            ProcessStage::InShipment => "IN_SHIPMENT",
            ProcessStage::ShipmentCompleted => "SHIPMENT_COMPLETED",
            ProcessStage::Completed => "COMPLETED",
            ProcessStage::Cancelled => "CANCELLED",
            ProcessStage::IssueReported => "ISSUE_REPORTED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ProcessStage::Draft),
            "ORDER_CONFIRMED" => Some(ProcessStage::OrderConfirmed),
            "IN_PROCUREMENT" => Some(ProcessStage::InProcurement),
            "PROCUREMENT_COMPLETED" => Some(ProcessStage::ProcurementCompleted),
            "IN_MANUFACTURING" => Some(ProcessStage::InManufacturing),
            "MANUFACTURING_COMPLETED" => Some(ProcessStage::ManufacturingCompleted),
            "IN_PROCUREMENT_AND_MANUFACTURING" => Some(ProcessStage::InProcurementAndManufacturing),
            "PROCUREMENT_AND_MANUFACTURING_COMPLETED" => {
                Some(ProcessStage::ProcurementAndManufacturingCompleted)
            }
            "IN_SHIPMENT" => Some(ProcessStage::InShipment),
            "SHIPMENT_COMPLETED" => Some(ProcessStage::ShipmentCompleted),
            "COMPLETED" => Some(ProcessStage::Completed),
            "CANCELLED" => Some(ProcessStage::Cancelled),
            "ISSUE_REPORTED" => Some(ProcessStage::IssueReported),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 单据状态 (Child Status)
// ==========================================
// 子单据的简化状态机
// 红线: CANCELLED / ISSUE_REPORTED 为同步终态,正向同步不得覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildStatus {
    Draft,         // 草稿
    Active,        // 执行中
    Completed,     // 已完成
    Cancelled,     // 已取消
    IssueReported, // 异常上报
}

impl ChildStatus {
    /// 同步终态: 正向同步跳过处于该状态的单据
    pub fn is_sync_terminal(&self) -> bool {
        matches!(self, ChildStatus::Cancelled | ChildStatus::IssueReported)
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ChildStatus::Draft => "DRAFT",
            ChildStatus::Active => "ACTIVE",
            ChildStatus::Completed => "COMPLETED",
            ChildStatus::Cancelled => "CANCELLED",
            ChildStatus::IssueReported => "ISSUE_REPORTED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(ChildStatus::Draft),
            "ACTIVE" => Some(ChildStatus::Active),
            "COMPLETED" => Some(ChildStatus::Completed),
            "CANCELLED" => Some(ChildStatus::Cancelled),
            "ISSUE_REPORTED" => Some(ChildStatus::IssueReported),
            _ => None,
        }
    }
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 子单据类别 (Sub Order Category)
// ==========================================
// 可变子单据的闭集类别 (销售单单独建模,不在此列)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubOrderCategory {
    Manufacturing, // 生产单
    Procurement,   // 采购单
    Shipment,      // 发货单
}

impl SubOrderCategory {
    pub const ALL: [SubOrderCategory; 3] = [
        SubOrderCategory::Manufacturing,
        SubOrderCategory::Procurement,
        SubOrderCategory::Shipment,
    ];

    pub fn to_db_str(&self) -> &'static str {
        match self {
            SubOrderCategory::Manufacturing => "MANUFACTURING",
            SubOrderCategory::Procurement => "PROCUREMENT",
            SubOrderCategory::Shipment => "SHIPMENT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "MANUFACTURING" => Some(SubOrderCategory::Manufacturing),
            "PROCUREMENT" => Some(SubOrderCategory::Procurement),
            "SHIPMENT" => Some(SubOrderCategory::Shipment),
            _ => None,
        }
    }
}

impl fmt::Display for SubOrderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 当前环节类别 (Active Category)
// ==========================================
// 标记流程当前的瓶颈单据类别
// 红线: 为 (流程类型, 环节) 的纯函数; 异常上报期间保留上报前的值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveCategory {
    None,                        // 无 (终止环节)
    SalesOrder,                  // 销售单
    Manufacturing,               // 生产
    Procurement,                 // 采购
    ManufacturingAndProcurement, // 生产与采购并行
    Shipment,                    // 发货
}

impl ActiveCategory {
    /// 该类别涵盖的可变子单据类别 (异常传播范围)
    pub fn sub_categories(&self) -> &'static [SubOrderCategory] {
        match self {
            ActiveCategory::None | ActiveCategory::SalesOrder => &[],
            ActiveCategory::Manufacturing => &[SubOrderCategory::Manufacturing],
            ActiveCategory::Procurement => &[SubOrderCategory::Procurement],
            ActiveCategory::ManufacturingAndProcurement => &[
                SubOrderCategory::Manufacturing,
                SubOrderCategory::Procurement,
            ],
            ActiveCategory::Shipment => &[SubOrderCategory::Shipment],
        }
    }

    /// 是否涵盖销售单本身
    pub fn includes_sales_order(&self) -> bool {
        matches!(self, ActiveCategory::SalesOrder)
    }

    /// 从上报异常的子单据类别得到标记值
    pub fn from_sub_category(category: SubOrderCategory) -> Self {
        match category {
            SubOrderCategory::Manufacturing => ActiveCategory::Manufacturing,
            SubOrderCategory::Procurement => ActiveCategory::Procurement,
            SubOrderCategory::Shipment => ActiveCategory::Shipment,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActiveCategory::None => "NONE",
            ActiveCategory::SalesOrder => "SALES_ORDER",
            ActiveCategory::Manufacturing => "MANUFACTURING",
            ActiveCategory::Procurement => "PROCUREMENT",
            ActiveCategory::ManufacturingAndProcurement => "MANUFACTURING_AND_PROCUREMENT",
            ActiveCategory::Shipment => "SHIPMENT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(ActiveCategory::None),
            "SALES_ORDER" => Some(ActiveCategory::SalesOrder),
            "MANUFACTURING" => Some(ActiveCategory::Manufacturing),
            "PROCUREMENT" => Some(ActiveCategory::Procurement),
            "MANUFACTURING_AND_PROCUREMENT" => Some(ActiveCategory::ManufacturingAndProcurement),
            "SHIPMENT" => Some(ActiveCategory::Shipment),
            _ => None,
        }
    }
}

impl fmt::Display for ActiveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 角色 (Role)
// ==========================================
// 角色只收紧流程图允许的目标环节,不扩张
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleId {
    Admin,                 // 系统管理员 (全部环节)
    GeneralManager,        // 总经理 (全部环节)
    SalesSpecialist,       // 销售专员
    ProductionPlanner,     // 生产计划员
    ProcurementSpecialist, // 采购专员
    LogisticsSpecialist,   // 物流专员
}

impl RoleId {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RoleId::Admin => "ADMIN",
            RoleId::GeneralManager => "GENERAL_MANAGER",
            RoleId::SalesSpecialist => "SALES_SPECIALIST",
            RoleId::ProductionPlanner => "PRODUCTION_PLANNER",
            RoleId::ProcurementSpecialist => "PROCUREMENT_SPECIALIST",
            RoleId::LogisticsSpecialist => "LOGISTICS_SPECIALIST",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(RoleId::Admin),
            "GENERAL_MANAGER" => Some(RoleId::GeneralManager),
            "SALES_SPECIALIST" => Some(RoleId::SalesSpecialist),
            "PRODUCTION_PLANNER" => Some(RoleId::ProductionPlanner),
            "PROCUREMENT_SPECIALIST" => Some(RoleId::ProcurementSpecialist),
            "LOGISTICS_SPECIALIST" => Some(RoleId::LogisticsSpecialist),
            _ => None,
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
