//! Ledger Persistence Layer
//!
//! SQLite storage for campaigns, investments and milestones. Each document is
//! stored as JSON next to the columns used for lookups, and every change set
//! is written inside one SQLite transaction.

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::campaign::Campaign;
use crate::error::{FundFlowError, Result};
use crate::investment::Investment;
use crate::milestone::Milestone;
use crate::store::{ChangeSet, Ledger};

/// SQLite persistence for ledger documents
pub struct LedgerPersistence {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerPersistence {
    /// Open (or create) the database at `db_path`
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| FundFlowError::Storage(format!("Failed to open database: {}", e)))?;
        Self::create_tables(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            FundFlowError::Storage(format!("Failed to open in-memory database: {}", e))
        })?;
        Self::create_tables(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn create_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                creator_address TEXT NOT NULL,
                status TEXT NOT NULL,
                deadline INTEGER NOT NULL,
                doc_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status);

            CREATE TABLE IF NOT EXISTS investments (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                investor_address TEXT NOT NULL,
                status TEXT NOT NULL,
                doc_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_investments_campaign ON investments(campaign_id);
            CREATE INDEX IF NOT EXISTS idx_investments_investor ON investments(investor_address);

            CREATE TABLE IF NOT EXISTS milestones (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                status TEXT NOT NULL,
                doc_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_milestones_campaign ON milestones(campaign_id);",
        )
        .map_err(|e| FundFlowError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Write every document in `changes` atomically
    pub async fn commit(&self, changes: &ChangeSet) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for campaign in changes.campaigns.values() {
            tx.execute(
                "INSERT INTO campaigns (id, creator_address, status, deadline, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    deadline = excluded.deadline,
                    doc_json = excluded.doc_json,
                    updated_at = excluded.updated_at",
                params![
                    campaign.id,
                    campaign.creator_address,
                    campaign.status.as_str(),
                    campaign.deadline as i64,
                    serde_json::to_string(campaign)?,
                    campaign.updated_at as i64,
                ],
            )?;
        }

        for investment in changes.investments.values() {
            tx.execute(
                "INSERT INTO investments (id, campaign_id, investor_address, status, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    doc_json = excluded.doc_json,
                    updated_at = excluded.updated_at",
                params![
                    investment.id,
                    investment.campaign_id,
                    investment.investor_address,
                    investment.status.as_str(),
                    serde_json::to_string(investment)?,
                    investment.updated_at as i64,
                ],
            )?;
        }

        for milestone in changes.milestones.values() {
            tx.execute(
                "INSERT INTO milestones (id, campaign_id, position, status, doc_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    position = excluded.position,
                    status = excluded.status,
                    doc_json = excluded.doc_json,
                    updated_at = excluded.updated_at",
                params![
                    milestone.id,
                    milestone.campaign_id,
                    milestone.order as i64,
                    milestone.status.as_str(),
                    serde_json::to_string(milestone)?,
                    milestone.updated_at as i64,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Persisted {} documents", changes.len());
        Ok(())
    }

    /// Load every stored document
    pub async fn load_all(&self) -> Result<Ledger> {
        let conn = self.conn.lock().await;
        let mut ledger = Ledger::default();

        for campaign in load_documents::<Campaign>(&conn, "campaigns")? {
            ledger.campaigns.insert(campaign.id.clone(), campaign);
        }
        for investment in load_documents::<Investment>(&conn, "investments")? {
            ledger.investments.insert(investment.id.clone(), investment);
        }
        for milestone in load_documents::<Milestone>(&conn, "milestones")? {
            ledger.milestones.insert(milestone.id.clone(), milestone);
        }

        Ok(ledger)
    }

    /// Count rows in a table
    pub async fn count(&self, table: &str) -> Result<usize> {
        let table = match table {
            "campaigns" | "investments" | "milestones" => table,
            other => {
                return Err(FundFlowError::Storage(format!("unknown table: {}", other)));
            }
        };
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    #[cfg(test)]
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

fn load_documents<T: DeserializeOwned>(conn: &Connection, table: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(&format!("SELECT doc_json FROM {} ORDER BY id", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut documents = Vec::new();
    for row in rows {
        let json = row?;
        documents.push(serde_json::from_str(&json)?);
    }
    Ok(documents)
}
