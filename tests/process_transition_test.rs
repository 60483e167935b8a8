// ==========================================
// 环节流转测试
// ==========================================
// 测试范围:
// 1. 流程图外的目标环节被拒绝且零副作用
// 2. 结构校验与权限校验无条件执行
// 3. 回退清理下游单据并可重复执行 (幂等)
// 4. 环节进入时间戳的设置与回退清除
// ==========================================

mod test_helpers;

use fulfillment_flow::api::ApiError;
use fulfillment_flow::domain::types::{
    ActiveCategory, ChildStatus, ProcessStage, ProcessType, SubOrderCategory,
};
use fulfillment_flow::engine::CreateSubOrderOptions;

// ==========================================
// 流程图检查
// ==========================================

/// 流程图外的流转失败并保持环节不变
#[test]
fn test_invalid_transition_leaves_stage_unchanged() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    // 草稿不能直接结案
    let err = api
        .transition(&process_id, ProcessStage::Completed, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));

    // 环节与修订号未变
    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::Draft);
    assert_eq!(after.process.revision, detail.process.revision);
}

/// 生产流程不可进入采购环节
#[test]
fn test_manufacturing_flow_rejects_procurement_stage() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);

    api.transition(&detail.process.process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    let err = api
        .transition(&detail.process.process_id, ProcessStage::InProcurement, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));
}

// ==========================================
// 校验器
// ==========================================

/// 订单确认要求销售单挂接客户账户
#[test]
fn test_order_confirm_requires_customer_account() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail =
        test_helpers::create_test_process_without_customer(api, ProcessType::ManufacturingFlow);

    let err = api
        .transition(&detail.process.process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 环节保持草稿
    let after = api.get_process(&detail.process.process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::Draft);
}

/// 没有生产单时不能标记生产完成 (管理员也不豁免结构校验)
#[test]
fn test_completion_requires_live_sub_order() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    api.transition(&process_id, ProcessStage::InManufacturing, "admin")
        .unwrap();

    let err = api
        .transition(&process_id, ProcessStage::ManufacturingCompleted, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));
}

/// 角色只收紧流程图: 物流专员无权确认订单,未登记用户一律拒绝
#[test]
fn test_permission_denied() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    let err = api
        .transition(&process_id, ProcessStage::OrderConfirmed, "logistics")
        .unwrap_err();
    assert!(matches!(err, ApiError::PermissionDenied { .. }));

    let err = api
        .transition(&process_id, ProcessStage::OrderConfirmed, "ghost")
        .unwrap_err();
    assert!(matches!(err, ApiError::PermissionDenied { .. }));

    // 销售专员可以确认
    api.transition(&process_id, ProcessStage::OrderConfirmed, "sales")
        .unwrap();
    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::OrderConfirmed);
}

// ==========================================
// 时间戳与正向同步
// ==========================================

/// 订单确认设置确认时间戳并激活销售单
#[test]
fn test_confirm_sets_timestamp_and_activates_sales_order() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    assert!(detail.process.confirmed_at.is_none());
    assert_eq!(detail.sales_order.as_ref().unwrap().status, ChildStatus::Draft);

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();

    let after = api.get_process(&process_id).unwrap();
    assert!(after.process.confirmed_at.is_some());
    assert_eq!(after.sales_order.unwrap().status, ChildStatus::Active);
    assert_eq!(after.process.active_category, ActiveCategory::SalesOrder);
}

// ==========================================
// 回退清理
// ==========================================

/// 回退到草稿删除生产单据,重复回退为空操作而非错误
#[test]
fn test_rollback_deletes_downstream_and_is_idempotent() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    api.create_sub_order(
        &process_id,
        SubOrderCategory::Manufacturing,
        "planner",
        CreateSubOrderOptions {
            auto_advance: true,
            ..Default::default()
        },
    )
    .unwrap();

    let before = api.get_process(&process_id).unwrap();
    assert_eq!(before.process.stage, ProcessStage::InManufacturing);
    assert_eq!(before.sub_orders.len(), 1);

    // 回退到草稿: 生产单失效
    let outcome = api
        .transition(&process_id, ProcessStage::Draft, "admin")
        .unwrap();
    assert_eq!(outcome.cleanup.manufacturing, 1);
    assert_eq!(outcome.cleanup.total(), 1);

    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::Draft);
    assert!(after.sub_orders.is_empty());
    // 确认时间戳随回退清除,销售单回到草稿
    assert!(after.process.confirmed_at.is_none());
    assert_eq!(after.sales_order.unwrap().status, ChildStatus::Draft);

    // 再次走到生产中后回退: 已无单据可删,空操作而非错误
    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    api.transition(&process_id, ProcessStage::InManufacturing, "admin")
        .unwrap();
    let outcome = api
        .transition(&process_id, ProcessStage::Draft, "admin")
        .unwrap();
    assert_eq!(outcome.cleanup.total(), 0);
}

/// 从发货中回退到生产完成只清理发货单,生产单保留
#[test]
fn test_rollback_from_shipment_preserves_manufacturing_orders() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    api.create_sub_order(
        &process_id,
        SubOrderCategory::Manufacturing,
        "planner",
        CreateSubOrderOptions {
            auto_advance: true,
            ..Default::default()
        },
    )
    .unwrap();
    api.transition(&process_id, ProcessStage::ManufacturingCompleted, "planner")
        .unwrap();
    api.create_sub_order(
        &process_id,
        SubOrderCategory::Shipment,
        "logistics",
        CreateSubOrderOptions {
            auto_advance: true,
            ..Default::default()
        },
    )
    .unwrap();

    let before = api.get_process(&process_id).unwrap();
    assert_eq!(before.process.stage, ProcessStage::InShipment);
    assert_eq!(before.sub_orders.len(), 2);

    let outcome = api
        .transition(&process_id, ProcessStage::ManufacturingCompleted, "admin")
        .unwrap();
    assert_eq!(outcome.cleanup.shipment, 1);
    assert_eq!(outcome.cleanup.manufacturing, 0);

    let after = api.get_process(&process_id).unwrap();
    let categories: Vec<SubOrderCategory> =
        after.sub_orders.iter().map(|order| order.category).collect();
    assert_eq!(categories, vec![SubOrderCategory::Manufacturing]);
}

// ==========================================
// 取消级联
// ==========================================

/// 取消流程级联取消未终态的单据
#[test]
fn test_cancel_cascades_to_children() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    api.create_sub_order(
        &process_id,
        SubOrderCategory::Manufacturing,
        "planner",
        CreateSubOrderOptions {
            auto_advance: true,
            ..Default::default()
        },
    )
    .unwrap();

    api.transition(&process_id, ProcessStage::Cancelled, "admin")
        .unwrap();

    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::Cancelled);
    assert!(after.process.cancelled_at.is_some());
    assert_eq!(after.process.active_category, ActiveCategory::None);
    assert_eq!(after.sales_order.unwrap().status, ChildStatus::Cancelled);
    for order in &after.sub_orders {
        assert_eq!(order.status, ChildStatus::Cancelled);
    }

    // 终止环节没有出边
    let err = api
        .transition(&process_id, ProcessStage::Draft, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidTransition { .. }));
}

// ==========================================
// 可达目标环节查询
// ==========================================

/// 可达目标环节 = 流程图 ∩ 角色权限,按优先级排序
#[test]
fn test_allowed_target_stages() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);
    let process_id = detail.process.process_id.clone();

    // 销售专员在草稿环节: 确认订单/取消
    let stages = api.allowed_target_stages(&process_id, "sales").unwrap();
    assert_eq!(
        stages,
        vec![ProcessStage::OrderConfirmed, ProcessStage::Cancelled]
    );

    // 物流专员在草稿环节无可用操作
    let stages = api.allowed_target_stages(&process_id, "logistics").unwrap();
    assert!(stages.is_empty());

    // 未登记用户无可用操作
    let stages = api.allowed_target_stages(&process_id, "ghost").unwrap();
    assert!(stages.is_empty());

    // 管理员可见流程图允许的全部目标
    let stages = api.allowed_target_stages(&process_id, "admin").unwrap();
    assert_eq!(
        stages,
        vec![ProcessStage::OrderConfirmed, ProcessStage::Cancelled]
    );
}
