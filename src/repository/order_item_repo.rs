// ==========================================
// OrderItemRepository - 单据行项目仓储
// ==========================================
// 行项目在创建子单据时从销售单整体复制,之后不做增量同步
// ==========================================

use crate::domain::order::OrderItem;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const ORDER_ITEM_COLUMNS: &str =
    "item_id, order_id, process_id, product_code, product_name, quantity, unit, remark";

/// 单据行项目仓储
pub struct OrderItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderItemRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<OrderItem> {
        Ok(OrderItem {
            item_id: row.get(0)?,
            order_id: row.get(1)?,
            process_id: row.get(2)?,
            product_code: row.get(3)?,
            product_name: row.get(4)?,
            quantity: row.get(5)?,
            unit: row.get(6)?,
            remark: row.get(7)?,
        })
    }

    /// 在事务中批量插入行项目
    pub fn batch_insert_tx(tx: &Transaction, items: &[OrderItem]) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"INSERT INTO order_item (
                item_id, order_id, process_id, product_code, product_name,
                quantity, unit, remark
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )?;

        let mut count = 0;
        for item in items {
            stmt.execute(params![
                item.item_id,
                item.order_id,
                item.process_id,
                item.product_code,
                item.product_name,
                item.quantity,
                item.unit,
                item.remark,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    /// 在事务中将来源单据的行项目整体复制到目标单据
    ///
    /// # 返回
    /// - Ok(rows): 复制的行项目数
    pub fn copy_items_tx(
        tx: &Transaction,
        source_order_id: &str,
        target_order_id: &str,
        process_id: &str,
    ) -> RepositoryResult<usize> {
        let sql = format!(
            "SELECT {} FROM order_item WHERE order_id = ?1",
            ORDER_ITEM_COLUMNS
        );
        let mut stmt = tx.prepare(&sql)?;
        let source_items = stmt
            .query_map(params![source_order_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<OrderItem>, _>>()?;

        let copied: Vec<OrderItem> = source_items
            .into_iter()
            .map(|item| OrderItem {
                item_id: Uuid::new_v4().to_string(),
                order_id: target_order_id.to_string(),
                process_id: process_id.to_string(),
                ..item
            })
            .collect();

        Self::batch_insert_tx(tx, &copied)
    }

    /// 按单据查询行项目
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM order_item WHERE order_id = ?1",
            ORDER_ITEM_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![order_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<OrderItem>, _>>()?;
        Ok(items)
    }
}
