// ==========================================
// 并发控制测试
// ==========================================
// 测试范围:
// 1. 基于过期 revision 的条件更新失败 (乐观锁)
// 2. 冲突经 API 层转换为用户可见的乐观锁错误
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use chrono::Utc;
use fulfillment_flow::domain::process::Process;
use fulfillment_flow::domain::types::{ActiveCategory, ProcessStage, ProcessType};
use fulfillment_flow::repository::{ProcessRepository, RepositoryError};

fn sample_process(process_id: &str) -> Process {
    let now = Utc::now().naive_utc();
    Process {
        process_id: process_id.to_string(),
        process_no: format!("FF-TEST-{}", process_id),
        process_type: ProcessType::ManufacturingFlow,
        stage: ProcessStage::Draft,
        active_category: ActiveCategory::SalesOrder,
        confirmed_at: None,
        completed_at: None,
        cancelled_at: None,
        remark: None,
        created_by: "admin".to_string(),
        created_at: now,
        updated_by: Some("admin".to_string()),
        updated_at: now,
        revision: 0,
    }
}

/// 两次基于同一份过期环节的更新: 第一次生效,第二次乐观锁冲突
#[test]
fn test_stale_revision_update_fails() {
    let (_temp, db_path) = test_helpers::create_test_db().unwrap();
    let conn = Arc::new(Mutex::new(
        fulfillment_flow::db::open_sqlite_connection(&db_path).unwrap(),
    ));

    let mut process = sample_process("p-001");
    {
        let guard = conn.lock().unwrap();
        let tx = guard.unchecked_transaction().unwrap();
        ProcessRepository::create_tx(&tx, &process).unwrap();
        tx.commit().unwrap();
    }

    // 第一次更新 (revision 0 -> 1)
    process.stage = ProcessStage::OrderConfirmed;
    process.confirmed_at = Some(Utc::now().naive_utc());
    {
        let guard = conn.lock().unwrap();
        let tx = guard.unchecked_transaction().unwrap();
        ProcessRepository::update_stage_tx(&tx, &process, 0).unwrap();
        tx.commit().unwrap();
    }

    // 第二次仍然拿着 revision 0: 冲突
    process.stage = ProcessStage::Cancelled;
    let guard = conn.lock().unwrap();
    let tx = guard.unchecked_transaction().unwrap();
    let err = ProcessRepository::update_stage_tx(&tx, &process, 0).unwrap_err();
    match err {
        RepositoryError::OptimisticLockFailure {
            process_id,
            expected,
            actual,
        } => {
            assert_eq!(process_id, "p-001");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("期望乐观锁冲突,得到: {}", other),
    }

    // 落库的仍是第一次更新的结果
    let stored = ProcessRepository::find_by_id_tx(&tx, "p-001").unwrap().unwrap();
    assert_eq!(stored.stage, ProcessStage::OrderConfirmed);
    assert_eq!(stored.revision, 1);
}

/// 不存在的流程: 条件更新报记录未找到而非乐观锁冲突
#[test]
fn test_update_missing_process_reports_not_found() {
    let (_temp, db_path) = test_helpers::create_test_db().unwrap();
    let conn = fulfillment_flow::db::open_sqlite_connection(&db_path).unwrap();
    let tx = conn.unchecked_transaction().unwrap();

    let process = sample_process("p-missing");
    let err = ProcessRepository::update_stage_tx(&tx, &process, 0).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}
