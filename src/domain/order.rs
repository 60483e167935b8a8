// ==========================================
// 订单履约流程协同系统 - 单据领域模型
// ==========================================
// 销售单: 每个流程恰好一张,随流程一并创建,是行项目的唯一来源
// 子单据: 生产/采购/发货,零到多张,由子单据工厂创建
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{ChildStatus, SubOrderCategory};

// ==========================================
// SalesOrder - 销售单
// ==========================================
// 与流程单一对一; 行项目在创建子单据时整体复制,之后不再同步
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub order_id: String,             // 单据ID
    pub process_id: String,           // 所属流程 (唯一)
    pub order_no: String,             // 单据编号
    pub customer_id: Option<String>,  // 客户账户ID (订单确认前可为空)
    pub customer_name: Option<String>, // 客户名称
    pub status: ChildStatus,          // 单据状态
    pub deleted: bool,                // 软删除标记

    // ===== 审计字段 =====
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl SalesOrder {
    /// 订单确认的前置条件: 客户账户已挂接
    pub fn has_customer_account(&self) -> bool {
        self.customer_id
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

// ==========================================
// SubOrder - 可变子单据 (生产/采购/发货)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubOrder {
    pub order_id: String,            // 单据ID
    pub process_id: String,          // 所属流程
    pub category: SubOrderCategory,  // 单据类别
    pub order_no: String,            // 单据编号
    pub status: ChildStatus,         // 单据状态
    pub deleted: bool,               // 软删除标记 (回退清理/级联取消)
    pub remark: Option<String>,      // 备注

    // ===== 审计字段 =====
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// OrderItem - 单据行项目
// ==========================================
// 创建子单据时从销售单行项目批量复制而来,不做增量同步
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: String,          // 行项目ID
    pub order_id: String,         // 所属单据 (销售单或子单据)
    pub process_id: String,       // 所属流程 (冗余,便于按流程清理)
    pub product_code: String,     // 产品编码
    pub product_name: String,     // 产品名称
    pub quantity: f64,            // 数量
    pub unit: Option<String>,     // 单位
    pub remark: Option<String>,   // 备注
}
