// ==========================================
// ProcessRepository - 流程单仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 并发控制: 环节流转走 update_stage_tx 的 revision 条件更新
// ==========================================

use crate::domain::process::Process;
use crate::domain::types::{ActiveCategory, ProcessStage, ProcessType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const PROCESS_COLUMNS: &str = "process_id, process_no, process_type, stage, active_category, \
     confirmed_at, completed_at, cancelled_at, remark, \
     created_by, created_at, updated_by, updated_at, revision";

/// 枚举列解析失败时转成 rusqlite 转换错误,避免静默落到默认值
fn column_parse_error(column: &str, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("非法的{}值: {}", column, raw).into(),
    )
}

/// 流程单仓储
pub struct ProcessRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<Process> {
        let process_type_raw: String = row.get(2)?;
        let stage_raw: String = row.get(3)?;
        let active_raw: String = row.get(4)?;

        Ok(Process {
            process_id: row.get(0)?,
            process_no: row.get(1)?,
            process_type: ProcessType::from_db_str(&process_type_raw)
                .ok_or_else(|| column_parse_error("process_type", &process_type_raw))?,
            stage: ProcessStage::from_db_str(&stage_raw)
                .ok_or_else(|| column_parse_error("stage", &stage_raw))?,
            active_category: ActiveCategory::from_db_str(&active_raw)
                .ok_or_else(|| column_parse_error("active_category", &active_raw))?,
            confirmed_at: row.get(5)?,
            completed_at: row.get(6)?,
            cancelled_at: row.get(7)?,
            remark: row.get(8)?,
            created_by: row.get(9)?,
            created_at: row.get(10)?,
            updated_by: row.get(11)?,
            updated_at: row.get(12)?,
            revision: row.get(13)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在事务中插入流程单
    pub fn create_tx(tx: &Transaction, process: &Process) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO fulfillment_process (
                process_id, process_no, process_type, stage, active_category,
                confirmed_at, completed_at, cancelled_at, remark,
                created_by, created_at, updated_by, updated_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                process.process_id,
                process.process_no,
                process.process_type.to_db_str(),
                process.stage.to_db_str(),
                process.active_category.to_db_str(),
                process.confirmed_at,
                process.completed_at,
                process.cancelled_at,
                process.remark,
                process.created_by,
                process.created_at,
                process.updated_by,
                process.updated_at,
                process.revision,
            ],
        )?;
        Ok(())
    }

    /// 在事务中更新流程环节 (带乐观锁检查)
    ///
    /// # 并发控制
    /// 条件更新 `WHERE process_id = ? AND revision = ?`,防止两次并发流转
    /// 基于同一份过期环节各自生效
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配
    /// - `RepositoryError::NotFound`: process_id 不存在
    pub fn update_stage_tx(
        tx: &Transaction,
        process: &Process,
        expected_revision: i32,
    ) -> RepositoryResult<()> {
        let rows_affected = tx.execute(
            r#"UPDATE fulfillment_process
               SET stage = ?1, active_category = ?2,
                   confirmed_at = ?3, completed_at = ?4, cancelled_at = ?5,
                   updated_by = ?6, updated_at = ?7, revision = revision + 1
               WHERE process_id = ?8 AND revision = ?9"#,
            params![
                process.stage.to_db_str(),
                process.active_category.to_db_str(),
                process.confirmed_at,
                process.completed_at,
                process.cancelled_at,
                process.updated_by,
                process.updated_at,
                process.process_id,
                expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            // 区分“记录不存在”与“版本冲突”
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM fulfillment_process WHERE process_id = ?1",
                    params![process.process_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    process_id: process.process_id.clone(),
                    expected: expected_revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Process".to_string(),
                    id: process.process_id.clone(),
                }),
            };
        }

        Ok(())
    }

    /// 在事务中更新当前环节类别标记 (反向同步的异常路径使用)
    pub fn update_active_category_tx(
        tx: &Transaction,
        process_id: &str,
        category: ActiveCategory,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = tx.execute(
            r#"UPDATE fulfillment_process
               SET active_category = ?1, updated_by = ?2, updated_at = ?3,
                   revision = revision + 1
               WHERE process_id = ?4"#,
            params![category.to_db_str(), actor, now, process_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Process".to_string(),
                id: process_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 在事务中按 process_id 查询
    pub fn find_by_id_tx(tx: &Transaction, process_id: &str) -> RepositoryResult<Option<Process>> {
        let sql = format!(
            "SELECT {} FROM fulfillment_process WHERE process_id = ?1",
            PROCESS_COLUMNS
        );
        match tx.query_row(&sql, params![process_id], |row| Self::map_row(row)) {
            Ok(process) => Ok(Some(process)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 process_id 查询流程单
    pub fn find_by_id(&self, process_id: &str) -> RepositoryResult<Option<Process>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM fulfillment_process WHERE process_id = ?1",
            PROCESS_COLUMNS
        );
        match conn.query_row(&sql, params![process_id], |row| Self::map_row(row)) {
            Ok(process) => Ok(Some(process)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询流程单列表 (按创建时间倒序)
    pub fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<Process>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM fulfillment_process ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            PROCESS_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let processes = stmt
            .query_map(params![limit, offset], |row| Self::map_row(row))?
            .collect::<Result<Vec<Process>, _>>()?;
        Ok(processes)
    }
}
