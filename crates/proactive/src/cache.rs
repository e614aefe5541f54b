//! Conversation reference cache manager.
//!
//! Sole owner of the proactive partitions in the table store. Every call is
//! a round trip to the store; there is no in-process cache to invalidate.

use std::sync::Arc;

use {
    herald_msteams::{ChannelAccount, ConversationReference},
    herald_store::{Entity, TableStore},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{Result, identity::IdentityKey};

/// Personal conversation references, keyed by user identity.
pub const USER_REFERENCE_PARTITION: &str = "userReference";
/// Roster snapshots: user identity to Teams member ID.
pub const ROSTER_PARTITION: &str = "userIDs";
/// External ID to conversation ID, used by the HTTP trigger path.
pub const CONVERSATION_ID_PARTITION: &str = "conversationIDs";

/// A roster member captured before first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Tenant-wide user identity (AAD object ID).
    pub user: IdentityKey,
    pub name: Option<String>,
    /// Bot-scoped Teams member ID (`29:...`).
    pub member_id: String,
}

impl RosterEntry {
    pub fn new(user: IdentityKey, name: Option<String>, member_id: impl Into<String>) -> Self {
        Self {
            user,
            name,
            member_id: member_id.into(),
        }
    }

    pub fn account(&self) -> ChannelAccount {
        ChannelAccount {
            id: self.member_id.clone(),
            name: self.name.clone(),
            aad_object_id: Some(self.user.as_str().to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct UserReferenceRecord {
    #[serde(default)]
    user: Option<String>,
    reference: String,
}

#[derive(Serialize, Deserialize)]
struct RosterRecord {
    #[serde(default)]
    name: Option<String>,
    id: String,
}

#[derive(Serialize, Deserialize)]
struct ConversationIdRecord {
    #[serde(rename = "conversationID")]
    conversation_id: String,
}

#[derive(Clone)]
pub struct ReferenceCache {
    store: Arc<dyn TableStore>,
    table: String,
}

impl ReferenceCache {
    /// Bind to `table`, creating it if needed.
    pub async fn open(store: Arc<dyn TableStore>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        store.create_table_if_absent(&table).await?;
        debug!(table = %table, "reference cache ready");
        Ok(Self { store, table })
    }

    /// Stored reference for `key`, or `None` if nothing was cached yet.
    pub async fn lookup(&self, key: &IdentityKey) -> Result<Option<ConversationReference>> {
        let Some(record) = self
            .read::<UserReferenceRecord>(USER_REFERENCE_PARTITION, key)
            .await?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&record.reference) {
            Ok(reference) => Ok(Some(reference)),
            Err(e) => {
                // Treated as absent so the next send re-creates and overwrites it.
                warn!(key = %key, error = %e, "discarding unreadable conversation reference");
                Ok(None)
            },
        }
    }

    /// Remember `reference` for `key`. Last writer wins.
    pub async fn store(
        &self,
        key: &IdentityKey,
        reference: &ConversationReference,
        user_name: Option<&str>,
    ) -> Result<()> {
        let record = UserReferenceRecord {
            user: user_name.map(str::to_string),
            reference: serde_json::to_string(reference).map_err(herald_store::Error::from)?,
        };
        self.write(USER_REFERENCE_PARTITION, key, &record).await?;
        debug!(
            key = %key,
            conversation_id = reference.conversation_id(),
            "stored conversation reference"
        );
        Ok(())
    }

    pub async fn lookup_roster(&self, key: &IdentityKey) -> Result<Option<RosterEntry>> {
        Ok(self
            .read::<RosterRecord>(ROSTER_PARTITION, key)
            .await?
            .map(|record| RosterEntry {
                user: key.clone(),
                name: record.name,
                member_id: record.id,
            }))
    }

    pub async fn store_roster(&self, entry: &RosterEntry) -> Result<()> {
        let record = RosterRecord {
            name: entry.name.clone(),
            id: entry.member_id.clone(),
        };
        self.write(ROSTER_PARTITION, &entry.user, &record).await
    }

    pub async fn lookup_conversation_id(&self, key: &IdentityKey) -> Result<Option<String>> {
        Ok(self
            .read::<ConversationIdRecord>(CONVERSATION_ID_PARTITION, key)
            .await?
            .map(|record| record.conversation_id))
    }

    pub async fn store_conversation_id(
        &self,
        key: &IdentityKey,
        conversation_id: &str,
    ) -> Result<()> {
        let record = ConversationIdRecord {
            conversation_id: conversation_id.to_string(),
        };
        self.write(CONVERSATION_ID_PARTITION, key, &record).await
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        partition: &str,
        key: &IdentityKey,
    ) -> Result<Option<T>> {
        match self
            .store
            .retrieve(&self.table, partition, key.as_str())
            .await
        {
            Ok(entity) => match entity.decode() {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(partition, key = %key, error = %e, "discarding malformed record");
                    Ok(None)
                },
            },
            Err(e) if e.is_not_found() => {
                debug!(partition, key = %key, "cache miss");
                Ok(None)
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize>(
        &self,
        partition: &str,
        key: &IdentityKey,
        record: &T,
    ) -> Result<()> {
        let entity = Entity::from_value(partition, key.as_str(), record)?;
        self.store.upsert(&self.table, entity).await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            Error,
            identity::{IdentityResolver, IdentitySource},
            testing::{FailingStore, sample_reference},
        },
        herald_store::InMemoryTableStore,
    };

    fn key(id: &str) -> IdentityKey {
        IdentityResolver::new()
            .resolve(IdentitySource::External(id))
            .unwrap()
    }

    async fn make_cache() -> (ReferenceCache, Arc<InMemoryTableStore>) {
        let store = Arc::new(InMemoryTableStore::new());
        let cache = ReferenceCache::open(store.clone(), "proactiveTable")
            .await
            .unwrap();
        (cache, store)
    }

    #[tokio::test]
    async fn lookup_miss_is_none() {
        let (cache, _) = make_cache().await;
        assert!(cache.lookup(&key("aad-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_then_lookup() {
        let (cache, store) = make_cache().await;
        let reference = sample_reference("a:1");
        cache
            .store(&key("aad-1"), &reference, Some("Megan"))
            .await
            .unwrap();

        let got = cache.lookup(&key("aad-1")).await.unwrap().unwrap();
        assert_eq!(got, reference);

        // Stored as a JSON string alongside the display name.
        let entity = store
            .retrieve("proactiveTable", USER_REFERENCE_PARTITION, "aad-1")
            .await
            .unwrap();
        assert_eq!(entity.field_str("user"), Some("Megan"));
        assert!(entity.field_str("reference").unwrap().contains("\"a:1\""));
    }

    #[tokio::test]
    async fn second_store_overwrites() {
        let (cache, store) = make_cache().await;
        cache
            .store(&key("aad-1"), &sample_reference("a:old"), None)
            .await
            .unwrap();
        cache
            .store(&key("aad-1"), &sample_reference("a:new"), None)
            .await
            .unwrap();
        let got = cache.lookup(&key("aad-1")).await.unwrap().unwrap();
        assert_eq!(got.conversation_id(), "a:new");
        assert_eq!(
            store.partition_len("proactiveTable", USER_REFERENCE_PARTITION),
            1
        );
    }

    #[tokio::test]
    async fn unreadable_reference_is_treated_as_missing() {
        let (cache, store) = make_cache().await;
        store
            .upsert(
                "proactiveTable",
                Entity::new(USER_REFERENCE_PARTITION, "aad-1").with_field("reference", "not json"),
            )
            .await
            .unwrap();
        assert!(cache.lookup(&key("aad-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roster_roundtrip() {
        let (cache, _) = make_cache().await;
        let entry = RosterEntry::new(key("aad-2"), Some("Adele".into()), "29:adele");
        cache.store_roster(&entry).await.unwrap();
        assert_eq!(cache.lookup_roster(&key("aad-2")).await.unwrap(), Some(entry));
        assert_eq!(cache.lookup_roster(&key("aad-3")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn conversation_id_miss_is_none_not_sentinel() {
        let (cache, _) = make_cache().await;
        assert_eq!(cache.lookup_conversation_id(&key("u")).await.unwrap(), None);
        cache.store_conversation_id(&key("u"), "a:9").await.unwrap();
        assert_eq!(
            cache.lookup_conversation_id(&key("u")).await.unwrap().as_deref(),
            Some("a:9")
        );
    }

    #[tokio::test]
    async fn store_failure_is_unavailable() {
        assert!(
            ReferenceCache::open(Arc::new(FailingStore::default()), "proactiveTable")
                .await
                .is_err()
        );
        let cache =
            ReferenceCache::open(Arc::new(FailingStore::accepting_tables()), "proactiveTable")
                .await
                .unwrap();
        let err = cache.lookup(&key("aad-1")).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }), "{err}");
        let err = cache
            .store(&key("aad-1"), &sample_reference("a:1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }
}
