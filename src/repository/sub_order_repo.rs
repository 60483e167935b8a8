// ==========================================
// SubOrderRepository - 子单据仓储
// ==========================================
// 生产/采购/发货单据共用 sub_order 表,按 category 闭集枚举区分
// 软删除: 回退清理与级联取消置 deleted = 1,查询一律过滤
// ==========================================

use crate::domain::order::SubOrder;
use crate::domain::types::{ChildStatus, SubOrderCategory};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};

const SUB_ORDER_COLUMNS: &str = "order_id, process_id, category, order_no, status, deleted, \
     remark, created_by, created_at, updated_by, updated_at";

/// 子单据仓储
pub struct SubOrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SubOrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<SubOrder> {
        let category_raw: String = row.get(2)?;
        let status_raw: String = row.get(4)?;
        Ok(SubOrder {
            order_id: row.get(0)?,
            process_id: row.get(1)?,
            category: SubOrderCategory::from_db_str(&category_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("非法的category值: {}", category_raw).into(),
                )
            })?,
            order_no: row.get(3)?,
            status: ChildStatus::from_db_str(&status_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    format!("非法的status值: {}", status_raw).into(),
                )
            })?,
            deleted: row.get(5)?,
            remark: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_by: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 在事务中插入子单据
    pub fn create_tx(tx: &Transaction, order: &SubOrder) -> RepositoryResult<()> {
        tx.execute(
            r#"INSERT INTO sub_order (
                order_id, process_id, category, order_no, status, deleted,
                remark, created_by, created_at, updated_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                order.order_id,
                order.process_id,
                order.category.to_db_str(),
                order.order_no,
                order.status.to_db_str(),
                order.deleted,
                order.remark,
                order.created_by,
                order.created_at,
                order.updated_by,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 在事务中更新单张子单据状态 (反向同步入口)
    pub fn update_status_tx(
        tx: &Transaction,
        order_id: &str,
        status: ChildStatus,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = tx.execute(
            r#"UPDATE sub_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE order_id = ?4 AND deleted = 0"#,
            params![status.to_db_str(), actor, now, order_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "SubOrder".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }

    /// 在事务中按正向同步规则批量设置某类别子单据状态
    ///
    /// - 同步终态 (CANCELLED / ISSUE_REPORTED) 的单据不被覆盖
    /// - 目标为 ACTIVE 时只激活草稿单据,已完成的单据不被拉回执行中
    pub fn sync_status_tx(
        tx: &Transaction,
        process_id: &str,
        category: SubOrderCategory,
        target: ChildStatus,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let sql = if target == ChildStatus::Active {
            r#"UPDATE sub_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND category = ?5 AND deleted = 0
                 AND status = 'DRAFT'"#
        } else {
            r#"UPDATE sub_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND category = ?5 AND deleted = 0
                 AND status NOT IN ('CANCELLED', 'ISSUE_REPORTED')"#
        };
        let rows = tx.execute(
            sql,
            params![
                target.to_db_str(),
                actor,
                now,
                process_id,
                category.to_db_str()
            ],
        )?;
        Ok(rows)
    }

    /// 在事务中将某类别下指定状态的子单据改写为另一状态 (异常传播/恢复)
    pub fn set_status_where_tx(
        tx: &Transaction,
        process_id: &str,
        category: SubOrderCategory,
        from_status: ChildStatus,
        to_status: ChildStatus,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let rows = tx.execute(
            r#"UPDATE sub_order
               SET status = ?1, updated_by = ?2, updated_at = ?3
               WHERE process_id = ?4 AND category = ?5 AND deleted = 0 AND status = ?6"#,
            params![
                to_status.to_db_str(),
                actor,
                now,
                process_id,
                category.to_db_str(),
                from_status.to_db_str()
            ],
        )?;
        Ok(rows)
    }

    /// 在事务中按类别软删除子单据 (回退清理)
    ///
    /// # 返回
    /// - Ok(rows): 被删除的单据数 (重复回退时为 0,属正常)
    pub fn soft_delete_by_category_tx(
        tx: &Transaction,
        process_id: &str,
        category: SubOrderCategory,
        actor: &str,
        now: chrono::NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let rows = tx.execute(
            r#"UPDATE sub_order
               SET deleted = 1, updated_by = ?1, updated_at = ?2
               WHERE process_id = ?3 AND category = ?4 AND deleted = 0"#,
            params![actor, now, process_id, category.to_db_str()],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 在事务中按 order_id 查询 (未删除)
    pub fn find_by_id_tx(tx: &Transaction, order_id: &str) -> RepositoryResult<Option<SubOrder>> {
        let sql = format!(
            "SELECT {} FROM sub_order WHERE order_id = ?1 AND deleted = 0",
            SUB_ORDER_COLUMNS
        );
        match tx.query_row(&sql, params![order_id], |row| Self::map_row(row)) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 order_id 查询 (未删除)
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<SubOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM sub_order WHERE order_id = ?1 AND deleted = 0",
            SUB_ORDER_COLUMNS
        );
        match conn.query_row(&sql, params![order_id], |row| Self::map_row(row)) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按流程查询全部未删除子单据
    pub fn find_by_process(&self, process_id: &str) -> RepositoryResult<Vec<SubOrder>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM sub_order WHERE process_id = ?1 AND deleted = 0 ORDER BY created_at",
            SUB_ORDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params![process_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<SubOrder>, _>>()?;
        Ok(orders)
    }

    /// 统计某类别未删除子单据数
    pub fn count_live(
        &self,
        process_id: &str,
        category: SubOrderCategory,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sub_order WHERE process_id = ?1 AND category = ?2 AND deleted = 0",
            params![process_id, category.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 统计某类别未删除且状态不等于给定值的子单据数
    pub fn count_live_not_in_status(
        &self,
        process_id: &str,
        category: SubOrderCategory,
        status: ChildStatus,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM sub_order
               WHERE process_id = ?1 AND category = ?2 AND deleted = 0 AND status != ?3"#,
            params![process_id, category.to_db_str(), status.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 在事务中统计某类别未删除子单据数
    pub fn count_live_tx(
        tx: &Transaction,
        process_id: &str,
        category: SubOrderCategory,
    ) -> RepositoryResult<i64> {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM sub_order WHERE process_id = ?1 AND category = ?2 AND deleted = 0",
            params![process_id, category.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 在事务中统计某类别未删除且状态不等于给定值的子单据数
    ///
    /// 用于“全部完成”判定: not_in_status(COMPLETED) == 0 即全部完成
    pub fn count_live_not_in_status_tx(
        tx: &Transaction,
        process_id: &str,
        category: SubOrderCategory,
        status: ChildStatus,
    ) -> RepositoryResult<i64> {
        let count: i64 = tx.query_row(
            r#"SELECT COUNT(*) FROM sub_order
               WHERE process_id = ?1 AND category = ?2 AND deleted = 0 AND status != ?3"#,
            params![process_id, category.to_db_str(), status.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
