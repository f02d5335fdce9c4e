//! In-Memory Ledger Storage
//!
//! All campaign, investment and milestone documents live behind a single
//! `RwLock`. Writes go through [`LedgerStore::transaction`], which stages
//! changed documents, persists them in one SQLite transaction when a
//! persistence layer is attached, and only then applies them to memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::campaign::Campaign;
use crate::error::Result;
use crate::investment::Investment;
use crate::milestone::Milestone;
use crate::persistence::LedgerPersistence;

/// Every document the node knows about
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub campaigns: HashMap<String, Campaign>,
    pub investments: HashMap<String, Investment>,
    pub milestones: HashMap<String, Milestone>,
}

impl Ledger {
    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.campaigns.get(id)
    }

    pub fn investment(&self, id: &str) -> Option<&Investment> {
        self.investments.get(id)
    }

    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.milestones.get(id)
    }

    /// Investments for a campaign, oldest first
    pub fn campaign_investments(&self, campaign_id: &str) -> Vec<&Investment> {
        let mut items: Vec<&Investment> = self
            .investments
            .values()
            .filter(|i| i.campaign_id == campaign_id)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Milestones for a campaign in `order`
    pub fn campaign_milestones(&self, campaign_id: &str) -> Vec<&Milestone> {
        let mut items: Vec<&Milestone> = self
            .milestones
            .values()
            .filter(|m| m.campaign_id == campaign_id)
            .collect();
        items.sort_by_key(|m| m.order);
        items
    }

    /// Investments held by a wallet, newest first
    pub fn investor_investments(&self, investor_address: &str) -> Vec<&Investment> {
        let mut items: Vec<&Investment> = self
            .investments
            .values()
            .filter(|i| i.investor_address == investor_address)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    fn apply(&mut self, changes: ChangeSet) {
        for (id, campaign) in changes.campaigns {
            self.campaigns.insert(id, campaign);
        }
        for (id, investment) in changes.investments {
            self.investments.insert(id, investment);
        }
        for (id, milestone) in changes.milestones {
            self.milestones.insert(id, milestone);
        }
    }
}

/// Documents written by one transaction
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub campaigns: BTreeMap<String, Campaign>,
    pub investments: BTreeMap<String, Investment>,
    pub milestones: BTreeMap<String, Milestone>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty() && self.investments.is_empty() && self.milestones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.campaigns.len() + self.investments.len() + self.milestones.len()
    }
}

/// A view of the ledger with staged writes layered on top
///
/// Reads see staged documents first, so a transaction observes its own
/// writes.
pub struct Transaction<'a> {
    ledger: &'a Ledger,
    changes: ChangeSet,
}

impl<'a> Transaction<'a> {
    fn new(ledger: &'a Ledger) -> Self {
        Self {
            ledger,
            changes: ChangeSet::default(),
        }
    }

    pub fn campaign(&self, id: &str) -> Option<&Campaign> {
        self.changes
            .campaigns
            .get(id)
            .or_else(|| self.ledger.campaigns.get(id))
    }

    pub fn investment(&self, id: &str) -> Option<&Investment> {
        self.changes
            .investments
            .get(id)
            .or_else(|| self.ledger.investments.get(id))
    }

    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.changes
            .milestones
            .get(id)
            .or_else(|| self.ledger.milestones.get(id))
    }

    pub fn campaign_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ledger.campaigns.keys().cloned().collect();
        ids.extend(
            self.changes
                .campaigns
                .keys()
                .filter(|id| !self.ledger.campaigns.contains_key(*id))
                .cloned(),
        );
        ids.sort();
        ids
    }

    pub fn milestone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ledger.milestones.keys().cloned().collect();
        ids.extend(
            self.changes
                .milestones
                .keys()
                .filter(|id| !self.ledger.milestones.contains_key(*id))
                .cloned(),
        );
        ids.sort();
        ids
    }

    /// Current investments for a campaign, staged versions included
    pub fn campaign_investments(&self, campaign_id: &str) -> Vec<&Investment> {
        let mut items: Vec<&Investment> = self
            .ledger
            .investments
            .values()
            .filter(|i| !self.changes.investments.contains_key(&i.id))
            .chain(self.changes.investments.values())
            .filter(|i| i.campaign_id == campaign_id)
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Current milestones for a campaign, staged versions included
    pub fn campaign_milestones(&self, campaign_id: &str) -> Vec<&Milestone> {
        let mut items: Vec<&Milestone> = self
            .ledger
            .milestones
            .values()
            .filter(|m| !self.changes.milestones.contains_key(&m.id))
            .chain(self.changes.milestones.values())
            .filter(|m| m.campaign_id == campaign_id)
            .collect();
        items.sort_by_key(|m| m.order);
        items
    }

    pub fn put_campaign(&mut self, campaign: Campaign) {
        self.changes.campaigns.insert(campaign.id.clone(), campaign);
    }

    pub fn put_investment(&mut self, investment: Investment) {
        self.changes
            .investments
            .insert(investment.id.clone(), investment);
    }

    pub fn put_milestone(&mut self, milestone: Milestone) {
        self.changes
            .milestones
            .insert(milestone.id.clone(), milestone);
    }

    fn into_changes(self) -> ChangeSet {
        self.changes
    }
}

/// Thread-safe ledger with atomic multi-document writes
pub struct LedgerStore {
    ledger: RwLock<Ledger>,
    persistence: Option<Arc<LedgerPersistence>>,
}

impl LedgerStore {
    /// Create an empty, memory-only store
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger::default()),
            persistence: None,
        }
    }

    /// Create a store backed by `persistence`, restoring its documents
    pub async fn with_persistence(persistence: Arc<LedgerPersistence>) -> Result<Self> {
        let ledger = persistence.load_all().await?;
        info!(
            "Restored {} campaigns, {} investments, {} milestones from database",
            ledger.campaigns.len(),
            ledger.investments.len(),
            ledger.milestones.len()
        );
        Ok(Self {
            ledger: RwLock::new(ledger),
            persistence: Some(persistence),
        })
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Run `f` against a read-locked ledger
    pub async fn read<R>(&self, f: impl FnOnce(&Ledger) -> R) -> R {
        let ledger = self.ledger.read().await;
        f(&ledger)
    }

    /// Run `f` under the write lock and commit whatever it stages
    ///
    /// If `f` fails, or the change set cannot be persisted, nothing is
    /// applied and the error is returned.
    pub async fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut ledger = self.ledger.write().await;

        let mut tx = Transaction::new(&ledger);
        let result = f(&mut tx)?;
        let changes = tx.into_changes();

        if changes.is_empty() {
            return Ok(result);
        }

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.commit(&changes).await {
                warn!("Ledger commit of {} documents failed: {}", changes.len(), e);
                return Err(e);
            }
        }

        debug!("Committed {} documents", changes.len());
        ledger.apply(changes);
        Ok(result)
    }

    pub async fn campaign_count(&self) -> usize {
        self.ledger.read().await.campaigns.len()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FundFlowError;

    const NOW: u64 = 1_700_000_000;

    fn campaign() -> Campaign {
        Campaign::new("Solar", "", "0xcreator", 1_000, NOW + 3600, NOW).unwrap()
    }

    #[tokio::test]
    async fn test_transaction_commits_documents() {
        let store = LedgerStore::new();
        let c = campaign();
        let id = c.id.clone();

        store
            .transaction(|tx| {
                tx.put_campaign(c);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.campaign_count().await, 1);
        let title = store
            .read(|l| l.campaign(&id).map(|c| c.title.clone()))
            .await;
        assert_eq!(title.as_deref(), Some("Solar"));
    }

    #[tokio::test]
    async fn test_transaction_sees_its_own_writes() {
        let store = LedgerStore::new();
        let c = campaign();
        let cid = c.id.clone();

        let count = store
            .transaction(|tx| {
                tx.put_campaign(c);
                let m = Milestone::new(cid.clone(), 1, "One", "", 100, 50, 0, NOW)?;
                tx.put_milestone(m);
                assert!(tx.campaign(&cid).is_some());
                Ok(tx.campaign_milestones(&cid).len())
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_failed_closure_applies_nothing() {
        let store = LedgerStore::new();
        let c = campaign();

        let result: Result<()> = store
            .transaction(|tx| {
                tx.put_campaign(c);
                Err(FundFlowError::Validation("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.campaign_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let persistence = Arc::new(LedgerPersistence::in_memory().unwrap());
        let store = LedgerStore::with_persistence(persistence.clone()).await.unwrap();

        let first = campaign();
        store
            .transaction(|tx| {
                tx.put_campaign(first);
                Ok(())
            })
            .await
            .unwrap();

        persistence.execute_raw("DROP TABLE campaigns").await.unwrap();

        let second = campaign();
        let result = store
            .transaction(|tx| {
                tx.put_campaign(second);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(FundFlowError::Storage(_))));
        assert_eq!(store.campaign_count().await, 1);
    }

    #[tokio::test]
    async fn test_restore_from_persistence() {
        let persistence = Arc::new(LedgerPersistence::in_memory().unwrap());
        let c = campaign();
        let cid = c.id.clone();
        {
            let store = LedgerStore::with_persistence(persistence.clone()).await.unwrap();
            store
                .transaction(|tx| {
                    let mut inv = Investment::new(cid.clone(), "0xalice", 500, 0, NOW)?;
                    inv.confirm("0xtx", NOW)?;
                    tx.put_investment(inv);
                    tx.put_campaign(c);
                    Ok(())
                })
                .await
                .unwrap();
        }

        let restored = LedgerStore::with_persistence(persistence).await.unwrap();
        assert!(restored.is_persistent());
        let count = restored.read(|l| l.campaign_investments(&cid).len()).await;
        assert_eq!(count, 1);
    }

    #[test]
    fn test_investor_investments_newest_first() {
        let mut ledger = Ledger::default();
        let old = Investment::new("cmp_1", "0xalice", 10, 0, NOW).unwrap();
        let new = Investment::new("cmp_2", "0xalice", 20, 0, NOW + 10).unwrap();
        let other = Investment::new("cmp_1", "0xbob", 30, 0, NOW).unwrap();
        for inv in [old, new, other] {
            ledger.investments.insert(inv.id.clone(), inv);
        }

        let held = ledger.investor_investments("0xalice");
        assert_eq!(held.len(), 2);
        assert_eq!(held[0].amount, 20);
    }
}
