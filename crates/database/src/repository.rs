use crate::DbError;
use chrono::{DateTime, Utc};
use core_types::{Order, SymbolState};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::str::FromStr;

/// High-level, application-specific interface to the ledger mirror. It
/// encapsulates all SQL; the engine never sees a row.
#[derive(Debug, Clone)]
pub struct MirrorRepository {
    pool: PgPool,
}

/// An order about to be inserted; the mirror assigns the durable id.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub price: Decimal,
    pub executed_qty: Decimal,
    pub cost: Decimal,
    pub cost_with_fee: Decimal,
    pub open_time: DateTime<Utc>,
}

/// Everything the engine needs to rebuild one symbol at startup.
#[derive(Debug, Clone)]
pub struct RestoredSymbol {
    pub name: String,
    pub step_size: Decimal,
    pub profit: Decimal,
    pub state: SymbolState,
    pub grid_size: Option<Decimal>,
    pub lot: Option<Decimal>,
    pub orders: Vec<Order>,
}

#[derive(Debug, FromRow)]
struct SymbolRow {
    id: i64,
    name: String,
    step_size: Decimal,
    profit: Decimal,
    state: String,
}

#[derive(Debug, FromRow)]
struct ConfigRow {
    symbol_name: String,
    grid_size: Decimal,
    lot: Decimal,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    price: Decimal,
    executed_qty: Decimal,
    cost: Decimal,
    cost_with_fee: Decimal,
    symbol_id: i64,
    open_time: DateTime<Utc>,
}

impl MirrorRepository {
    /// Creates a new `MirrorRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads every symbol, its dynamic config and its open orders. Orders
    /// come back in insertion order, which is the ladder order the partial
    /// sell scan depends on.
    pub async fn load_state(&self) -> Result<Vec<RestoredSymbol>, DbError> {
        let symbols = sqlx::query_as::<_, SymbolRow>(
            "SELECT id, name, step_size, profit, state FROM symbols ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let configs = sqlx::query_as::<_, ConfigRow>(
            "SELECT symbol_name, grid_size, lot FROM symbols_config",
        )
        .fetch_all(&self.pool)
        .await?;

        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT id, price, executed_qty, cost, cost_with_fee, symbol_id, open_time \
             FROM orders_info ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut restored = Vec::with_capacity(symbols.len());
        for row in symbols {
            let config = configs.iter().find(|c| c.symbol_name == row.name);
            let symbol_orders = orders
                .iter()
                .filter(|o| o.symbol_id == row.id)
                .map(|o| Order {
                    id: o.id,
                    price: o.price,
                    executed_qty: o.executed_qty,
                    cost: o.cost,
                    cost_with_fee: o.cost_with_fee,
                    open_time: o.open_time,
                })
                .collect();

            restored.push(RestoredSymbol {
                state: SymbolState::from_str(&row.state).unwrap_or(SymbolState::Stop),
                name: row.name,
                step_size: row.step_size,
                profit: row.profit,
                grid_size: config.map(|c| c.grid_size),
                lot: config.map(|c| c.lot),
                orders: symbol_orders,
            });
        }

        Ok(restored)
    }

    /// Registers a symbol; a no-op if it already exists.
    pub async fn add_symbol(&self, name: &str, step_size: Decimal) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO symbols (name, step_size, profit, state) VALUES ($1, $2, 0, 'stop') \
             ON CONFLICT (name) DO UPDATE SET step_size = EXCLUDED.step_size",
        )
        .bind(name)
        .bind(step_size)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes a symbol together with its config and any leftover orders.
    pub async fn delete_symbol(&self, name: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM symbols WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_state(&self, name: &str, state: SymbolState) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE symbols SET state = $1 WHERE name = $2")
            .bind(state.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::UnknownSymbol(name.to_string()));
        }
        Ok(())
    }

    /// Creates or updates the dynamic lot/grid pair the indicator derives.
    pub async fn upsert_config(
        &self,
        name: &str,
        lot: Decimal,
        grid_size: Decimal,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO symbols_config (symbol_name, grid_size, lot) VALUES ($1, $2, $3) \
             ON CONFLICT (symbol_name) DO UPDATE SET grid_size = EXCLUDED.grid_size, lot = EXCLUDED.lot",
        )
        .bind(name)
        .bind(grid_size)
        .bind(lot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts one filled buy and returns the durable order id.
    pub async fn add_order(&self, symbol: &str, order: &NewOrder) -> Result<i64, DbError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders_info (price, executed_qty, cost, cost_with_fee, symbol_id, open_time) \
             SELECT $1, $2, $3, $4, s.id, $5 FROM symbols s WHERE s.name = $6 \
             RETURNING id",
        )
        .bind(order.price)
        .bind(order.executed_qty)
        .bind(order.cost)
        .bind(order.cost_with_fee)
        .bind(order.open_time)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::UnknownSymbol(symbol.to_string()))?;

        Ok(id)
    }

    /// Applies a completed sell in one transaction: adds the realised
    /// profit and removes the sold order rows. `ids = None` clears every
    /// order of the symbol (full sell).
    pub async fn commit_sell(
        &self,
        symbol: &str,
        real_profit: Decimal,
        ids: Option<&[i64]>,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE symbols SET profit = profit + $1 WHERE name = $2")
            .bind(real_profit)
            .bind(symbol)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::UnknownSymbol(symbol.to_string()));
        }

        match ids {
            Some(ids) => {
                sqlx::query("DELETE FROM orders_info WHERE id = ANY($1)")
                    .bind(ids)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM orders_info WHERE symbol_id = \
                     (SELECT id FROM symbols WHERE name = $1)",
                )
                .bind(symbol)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes order rows without touching profit (`d_all` operator path).
    pub async fn del_orders(&self, symbol: &str, ids: Option<&[i64]>) -> Result<(), DbError> {
        match ids {
            Some(ids) => {
                sqlx::query("DELETE FROM orders_info WHERE id = ANY($1)")
                    .bind(ids)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM orders_info WHERE symbol_id = \
                     (SELECT id FROM symbols WHERE name = $1)",
                )
                .bind(symbol)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Set of order ids currently mirrored for a symbol. Used by tests and
    /// the consistency checks after add/delete.
    pub async fn order_ids(&self, symbol: &str) -> Result<Vec<i64>, DbError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT o.id FROM orders_info o JOIN symbols s ON s.id = o.symbol_id \
             WHERE s.name = $1 ORDER BY o.id",
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
