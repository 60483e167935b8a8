// ==========================================
// SalesOrderRepository - 销售单仓储
// ==========================================
// 销售单与流程单一对一,行项目以销售单为唯一来源
// ==========================================

use crate::domain::order::SalesOrder;
use crate::domain::types::ChildStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SALES_ORDER_COLUMNS: &str = "order_id, process_id, order_no, customer_id, customer_name, \
     status, deleted, created_by, created_at, updated_by, updated_at";

/// 销售单仓储
pub struct SalesOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SalesOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<SalesOrder> {
        let status_raw: String = row.get(5)?;
        Ok(SalesOrder {
            order_id: row.get(0)?,
            process_id: row.get(1)?,
            order_no: row.get(2)?,
            customer_id: row.get(3)?,
            customer_name: row.get(4)?,
            status: ChildStatus::from_db_str(&status_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    format!("非法的status值: {}", status_raw).into(),
                )
            })?,
            deleted: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_by: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在事务中插入销售单
    pub fn create_tx(tx: &Transaction, order: &SalesOrder) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO sales_order (
                order_id, process_id, order_no, customer_id, customer_name,
                status, deleted, created_by, created_at, updated_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                order.order_id,
                order.process_id,
                order.order_no,
                order.customer_id,
                order.customer_name,
                order.status.to_db_str(),
                order.deleted,
                order.created_by,
                order.created_at,
                order.updated_by,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 在事务中按正向同步规则设置销售单状态
    ///
    /// - 同步终态 (CANCELLED / ISSUE_REPORTED) 的单据不被覆盖
    /// - 目标为 ACTIVE 时只激活草稿单据,已完成的单据不被拉回执行中
    pub fn sync_status_tx(
        tx: &Transaction,
        process_id: &str,
        target: ChildStatus,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let sql = if target == ChildStatus::Active {
            r#"UPDATE sales_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND deleted = 0
                 AND status = 'DRAFT'"#
        } else {
            r#"UPDATE sales_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND deleted = 0
                 AND status NOT IN ('CANCELLED', 'ISSUE_REPORTED')"#
        };
        let rows = tx.execute(sql, params![target.to_db_str(), actor, now, process_id])?;
        Ok(rows)
    }

    /// 在事务中将指定状态的销售单改写为另一状态 (异常传播/恢复)
    pub fn set_status_where_tx(
        tx: &Transaction,
        process_id: &str,
        from_status: ChildStatus,
        to_status: ChildStatus,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let rows = tx.execute(
            r#"UPDATE sales_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND deleted = 0 AND status = ?5"#,
            params![
                to_status.to_db_str(),
                actor,
                now,
                process_id,
                from_status.to_db_str()
            ],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 在事务中按流程查询销售单 (未删除)
    pub fn find_by_process_tx(
        tx: &Transaction,
        process_id: &str,
    ) -> RepositoryResult<Option<SalesOrder>> {
        let sql = format!(
            "SELECT {} FROM sales_order WHERE process_id = ?1 AND deleted = 0",
            SALES_ORDER_COLUMNS
        );
        match tx.query_row(&sql, params![process_id], |row| Self::map_row(row)) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按流程查询销售单 (未删除)
    pub fn find_by_process(&self, process_id: &str) -> RepositoryResult<Option<SalesOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM sales_order WHERE process_id = ?1 AND deleted = 0",
            SALES_ORDER_COLUMNS
        );
        match conn.query_row(&sql, params![process_id], |row| Self::map_row(row)) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
