// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

/// 操作日志仓储
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<ActionLog> {
        let payload_raw: Option<String> = row.get(5)?;
        Ok(ActionLog {
            action_id: row.get(0)?,
            process_id: row.get(1)?,
            action_type: row.get(2)?,
            action_ts: row.get(3)?,
            actor: row.get(4)?,
            payload_json: payload_raw.and_then(|s| serde_json::from_str(&s).ok()),
            detail: row.get(6)?,
        })
    }

    /// 在事务中插入操作日志
    pub fn insert_tx(tx: &Transaction, log: &ActionLog) -> RepositoryResult<String> {
        tx.execute(
            r#"INSERT INTO action_log (
                action_id, process_id, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                log.action_id,
                log.process_id,
                log.action_type,
                log.action_ts,
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 插入操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let id = Self::insert_tx(&tx, log)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(id)
    }

    /// 按流程查询操作日志 (时间倒序)
    pub fn find_by_process(&self, process_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT action_id, process_id, action_type, action_ts, actor,
                      payload_json, detail
               FROM action_log
               WHERE process_id = ?1
               ORDER BY action_ts DESC, action_id DESC"#,
        )?;
        let logs = stmt
            .query_map(params![process_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<ActionLog>, _>>()?;
        Ok(logs)
    }
}
