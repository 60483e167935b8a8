// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、角色表、流程创建等功能
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use tempfile::NamedTempFile;

use fulfillment_flow::api::{CreateProcessRequest, NewOrderItem, ProcessApi, ProcessDetail};
use fulfillment_flow::app::AppState;
use fulfillment_flow::domain::types::{ProcessType, RoleId};
use fulfillment_flow::engine::StaticRoleDirectory;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = fulfillment_flow::db::open_sqlite_connection(&db_path)?;
    fulfillment_flow::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 默认测试角色表
///
/// - admin: 系统管理员 (全部环节)
/// - sales: 销售专员
/// - planner: 生产计划员
/// - buyer: 采购专员
/// - logistics: 物流专员
/// - ("ghost" 等未登记用户无角色)
pub fn default_role_directory() -> Arc<StaticRoleDirectory> {
    Arc::new(StaticRoleDirectory::from_pairs(&[
        ("admin", RoleId::Admin),
        ("manager", RoleId::GeneralManager),
        ("sales", RoleId::SalesSpecialist),
        ("planner", RoleId::ProductionPlanner),
        ("buyer", RoleId::ProcurementSpecialist),
        ("logistics", RoleId::LogisticsSpecialist),
    ]))
}

/// 创建完整的测试应用状态
pub fn setup_app() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let app = AppState::new(db_path, default_role_directory()).expect("初始化AppState失败");
    (temp_file, app)
}

/// 创建测试流程 (含客户账户与两条行项目)
pub fn create_test_process(api: &ProcessApi, process_type: ProcessType) -> ProcessDetail {
    api.create_process(
        CreateProcessRequest {
            process_no: None,
            process_type,
            customer_id: Some("CUST-001".to_string()),
            customer_name: Some("华东贸易有限公司".to_string()),
            items: vec![
                NewOrderItem {
                    product_code: "P-1001".to_string(),
                    product_name: "标准件A".to_string(),
                    quantity: 100.0,
                    unit: Some("件".to_string()),
                    remark: None,
                },
                NewOrderItem {
                    product_code: "P-1002".to_string(),
                    product_name: "标准件B".to_string(),
                    quantity: 50.0,
                    unit: Some("件".to_string()),
                    remark: None,
                },
            ],
            remark: None,
        },
        "admin",
    )
    .expect("创建测试流程失败")
}

/// 创建无客户账户的测试流程 (用于订单确认前置条件测试)
pub fn create_test_process_without_customer(
    api: &ProcessApi,
    process_type: ProcessType,
) -> ProcessDetail {
    api.create_process(
        CreateProcessRequest {
            process_no: None,
            process_type,
            customer_id: None,
            customer_name: None,
            items: Vec::new(),
            remark: None,
        },
        "admin",
    )
    .expect("创建测试流程失败")
}
