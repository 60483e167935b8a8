// ==========================================
// 订单履约流程协同系统 - 流程单领域模型
// ==========================================
// 流程单是编排根: 驱动环节流转并拥有全部子单据
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{ActiveCategory, ProcessStage, ProcessType};

// ==========================================
// Process - 流程单
// ==========================================
// 红线: stage 必须始终是其流程类型流程图中的成员
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub process_id: String,              // 流程ID
    pub process_no: String,              // 流程编号 (业务编号)
    pub process_type: ProcessType,       // 流程类型
    pub stage: ProcessStage,             // 当前环节
    pub active_category: ActiveCategory, // 当前环节类别标记

    // ===== 环节进入时间戳 (仅三个环节有专属字段) =====
    pub confirmed_at: Option<NaiveDateTime>, // 订单确认时间
    pub completed_at: Option<NaiveDateTime>, // 完成时间
    pub cancelled_at: Option<NaiveDateTime>, // 取消时间

    pub remark: Option<String>, // 备注

    // ===== 审计字段 =====
    pub created_by: String,          // 创建人
    pub created_at: NaiveDateTime,   // 创建时间
    pub updated_by: Option<String>,  // 最后操作人
    pub updated_at: NaiveDateTime,   // 最后更新时间

    // ===== 并发控制 =====
    pub revision: i32, // 乐观锁修订号
}

impl Process {
    /// 是否处于终止环节
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// 是否处于异常上报环节
    pub fn is_issue_reported(&self) -> bool {
        self.stage == ProcessStage::IssueReported
    }
}
