// ==========================================
// 状态同步测试
// ==========================================
// 测试范围:
// 1. 反向同步: 子单据全部完成触发且仅触发一次自动推进
// 2. 异常传播只触及执行中的单据
// 3. 异常处理恢复只还原被传播的单据
// 4. 咨询性流转失败不影响子单据状态变更
// ==========================================

mod test_helpers;

use fulfillment_flow::api::ApiError;
use fulfillment_flow::domain::types::{
    ActiveCategory, ChildStatus, ProcessStage, ProcessType, SubOrderCategory,
};
use fulfillment_flow::engine::CreateSubOrderOptions;

// ==========================================
// 自动推进
// ==========================================

/// N 张生产单逐张完成: 前 N-1 张不触发推进,第 N 张触发且只触发一次
#[test]
fn test_auto_advance_fires_once_when_all_complete() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::HybridFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();

    // 第一张生产单创建后推进到生产中,其余两张并行 (混合流程允许多张)
    let first = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let second = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions::default(),
        )
        .unwrap();
    let third = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions::default(),
        )
        .unwrap();

    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InManufacturing
    );

    // 逐张完成
    api.update_sub_order_status(&first.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InManufacturing,
        "仅一张完成不应推进"
    );

    api.update_sub_order_status(&second.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InManufacturing,
        "还剩一张未完成不应推进"
    );

    api.update_sub_order_status(&third.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::ManufacturingCompleted,
        "全部完成应自动推进"
    );

    // 自动推进恰好发生一次
    let auto_advances = api
        .list_action_logs(&process_id)
        .unwrap()
        .into_iter()
        .filter(|log| log.action_type == "AUTO_ADVANCE")
        .count();
    assert_eq!(auto_advances, 1);
}

/// 并行环节的自动推进要求生产与采购都全部完成
#[test]
fn test_hybrid_parallel_auto_advance_requires_both_categories() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::HybridFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    let manufacturing = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let procurement = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Procurement,
            "buyer",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InProcurementAndManufacturing
    );

    // 只有生产完成: 不推进
    api.update_sub_order_status(&manufacturing.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InProcurementAndManufacturing
    );

    // 采购也完成: 推进到并行完成环节
    api.update_sub_order_status(&procurement.order.order_id, ChildStatus::Completed, "buyer")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::ProcurementAndManufacturingCompleted
    );
}

// ==========================================
// 异常传播与恢复
// ==========================================

/// 异常传播只触及执行中的单据: 已完成的生产单保持已完成
#[test]
fn test_issue_propagation_only_touches_active_orders() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::HybridFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    let done = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let reporter = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions::default(),
        )
        .unwrap();
    let bystander = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions::default(),
        )
        .unwrap();

    // done 完成,reporter/bystander 进入执行中
    api.update_sub_order_status(&done.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    api.update_sub_order_status(&reporter.order.order_id, ChildStatus::Active, "planner")
        .unwrap();
    api.update_sub_order_status(&bystander.order.order_id, ChildStatus::Active, "planner")
        .unwrap();

    // reporter 上报异常: 流程整体进入异常上报,传播触及 bystander
    api.update_sub_order_status(&reporter.order.order_id, ChildStatus::IssueReported, "planner")
        .unwrap();

    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::IssueReported);
    // 异常期间保留上报类别
    assert_eq!(after.process.active_category, ActiveCategory::Manufacturing);

    let status_of = |order_id: &str| {
        after
            .sub_orders
            .iter()
            .find(|order| order.order_id == order_id)
            .unwrap()
            .status
    };
    assert_eq!(status_of(&done.order.order_id), ChildStatus::Completed);
    assert_eq!(status_of(&reporter.order.order_id), ChildStatus::IssueReported);
    assert_eq!(status_of(&bystander.order.order_id), ChildStatus::IssueReported);
}

/// 异常处理恢复: 恰好还原被传播的单据,已完成单据不被拉回执行中
#[test]
fn test_resolution_round_trip() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::HybridFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    let done = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    let reporter = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions::default(),
        )
        .unwrap();
    api.update_sub_order_status(&done.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    api.update_sub_order_status(&reporter.order.order_id, ChildStatus::Active, "planner")
        .unwrap();
    api.update_sub_order_status(&reporter.order.order_id, ChildStatus::IssueReported, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::IssueReported
    );

    // 恢复到生产中
    api.resolve_issue(&process_id, ProcessStage::InManufacturing, "planner")
        .unwrap();

    let after = api.get_process(&process_id).unwrap();
    assert_eq!(after.process.stage, ProcessStage::InManufacturing);
    assert_eq!(after.process.active_category, ActiveCategory::Manufacturing);

    let status_of = |order_id: &str| {
        after
            .sub_orders
            .iter()
            .find(|order| order.order_id == order_id)
            .unwrap()
            .status
    };
    // 被传播的单据回到执行中,已完成的保持已完成
    assert_eq!(status_of(&reporter.order.order_id), ChildStatus::Active);
    assert_eq!(status_of(&done.order.order_id), ChildStatus::Completed);
}

/// 恢复环节限定: 只能回到草稿/已取消/与上报类别匹配的进行中环节
#[test]
fn test_resolve_rejects_mismatched_resume_stage() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::HybridFlow);
    let process_id = detail.process.process_id.clone();

    api.transition(&process_id, ProcessStage::OrderConfirmed, "admin")
        .unwrap();
    let order = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Manufacturing,
            "planner",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();
    api.update_sub_order_status(&order.order.order_id, ChildStatus::IssueReported, "planner")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::IssueReported
    );

    // 生产类异常不能直接恢复到发货中
    let err = api
        .resolve_issue(&process_id, ProcessStage::InShipment, "admin")
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    // 恢复到匹配的生产中环节成功
    api.resolve_issue(&process_id, ProcessStage::InManufacturing, "admin")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InManufacturing
    );
}

/// 非异常环节不可执行异常处理恢复
#[test]
fn test_resolve_requires_issue_state() {
    let (_temp, app) = test_helpers::setup_app();
    let api = &app.process_api;
    let detail = test_helpers::create_test_process(api, ProcessType::ManufacturingFlow);

    let err = api
        .resolve_issue(
            &detail.process.process_id,
            ProcessStage::InManufacturing,
            "admin",
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::NotInIssueState { .. }));
}

// ==========================================
// 咨询性流转的隔离性
// ==========================================

/// 咨询性自动推进失败不回滚子单据状态变更
///
/// 生产计划员完成最后一张发货单,但其角色无权流转到发货完成:
/// 推进失败被吞掉,发货单的完成状态仍然落库
#[test]
fn test_advisory_failure_keeps_child_status() {
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
    let shipment = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Shipment,
            "logistics",
            CreateSubOrderOptions {
                auto_advance: true,
                ..Default::default()
            },
        )
        .unwrap();

    // planner 无权流转到发货完成,自动推进失败但状态变更保留
    let updated = api
        .update_sub_order_status(&shipment.order.order_id, ChildStatus::Completed, "planner")
        .unwrap();
    assert_eq!(updated.status, ChildStatus::Completed);
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::InShipment,
        "推进失败应保持原环节"
    );

    // 有权限的物流专员补一张并完成: 推进成功
    // (发货单默认一张,这里用 force 创建第二张)
    let second = api
        .create_sub_order(
            &process_id,
            SubOrderCategory::Shipment,
            "logistics",
            CreateSubOrderOptions {
                force: true,
                ..Default::default()
            },
        )
        .unwrap();
    api.update_sub_order_status(&second.order.order_id, ChildStatus::Completed, "logistics")
        .unwrap();
    assert_eq!(
        api.get_process(&process_id).unwrap().process.stage,
        ProcessStage::ShipmentCompleted
    );
}
