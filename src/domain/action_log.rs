// ==========================================
// 订单履约流程协同系统 - 操作日志领域模型
// ==========================================
// 红线: 流程核心提交的每一次写入都要留痕
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,          // 日志ID
    pub process_id: Option<String>, // 关联流程 (个别系统操作可为None)
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,   // 操作时间戳
    pub actor: String,              // 操作人

    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述
}

impl ActionLog {
    /// 构造一条操作日志 (自动生成 action_id 与时间戳)
    pub fn record(
        process_id: Option<&str>,
        action_type: ActionType,
        actor: &str,
        payload_json: Option<JsonValue>,
        detail: Option<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            process_id: process_id.map(|s| s.to_string()),
            action_type: action_type.to_db_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor: actor.to_string(),
            payload_json,
            detail,
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateProcess,   // 创建流程 (含销售单)
    StageTransition, // 环节流转
    RollbackCleanup, // 回退清理下游单据
    CreateSubOrder,  // 创建子单据
    SubOrderStatus,  // 子单据状态变更
    IssueResolve,    // 异常处理恢复
    AutoAdvance,     // 子单据完成触发的自动推进
    CascadeCancel,   // 取消级联
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::CreateProcess => "CREATE_PROCESS",
            ActionType::StageTransition => "STAGE_TRANSITION",
            ActionType::RollbackCleanup => "ROLLBACK_CLEANUP",
            ActionType::CreateSubOrder => "CREATE_SUB_ORDER",
            ActionType::SubOrderStatus => "SUB_ORDER_STATUS",
            ActionType::IssueResolve => "ISSUE_RESOLVE",
            ActionType::AutoAdvance => "AUTO_ADVANCE",
            ActionType::CascadeCancel => "CASCADE_CANCEL",
        }
    }
}
