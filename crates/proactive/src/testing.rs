//! Recording fakes for the connector and the table store.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use {
    async_trait::async_trait,
    herald_msteams::{
        ChannelAccount, Connector, ConversationAccount, ConversationParameters,
        ConversationReference, ConversationResourceResponse, OutgoingActivity, ResourceResponse,
        TeamsChannelAccount,
    },
    herald_store::{Entity, InMemoryTableStore, TableStore},
    tokio::sync::Barrier,
};

pub const TEST_SERVICE_URL: &str = "https://smba.example/emea/";

/// A stored-looking personal reference for `conversation_id`.
pub fn sample_reference(conversation_id: &str) -> ConversationReference {
    ConversationReference {
        activity_id: None,
        user: Some(ChannelAccount::new("29:user", Some("Megan".into()))),
        bot: Some(ChannelAccount::new("28:bot", Some("Herald".into()))),
        conversation: ConversationAccount {
            id: conversation_id.to_string(),
            conversation_type: Some("personal".into()),
            ..Default::default()
        },
        channel_id: "msteams".into(),
        locale: None,
        service_url: TEST_SERVICE_URL.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorCall {
    Create {
        service_url: String,
        params: ConversationParameters,
    },
    Send {
        service_url: String,
        conversation_id: String,
        activity: OutgoingActivity,
    },
    Members {
        service_url: String,
        conversation_id: String,
    },
}

/// In-process connector that records every call and hands out sequential
/// conversation IDs (`a:conv-1`, `a:conv-2`, ...).
#[derive(Default)]
pub struct RecordingConnector {
    calls: Mutex<Vec<ConnectorCall>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    fail_send: AtomicBool,
    members: Mutex<Vec<TeamsChannelAccount>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_members(members: Vec<TeamsChannelAccount>) -> Arc<Self> {
        let connector = Self::default();
        *connector.members.lock().unwrap_or_else(|e| e.into_inner()) = members;
        Arc::new(connector)
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn creates(&self) -> Vec<ConversationParameters> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConnectorCall::Create { params, .. } => Some(params),
                _ => None,
            })
            .collect()
    }

    /// `(conversation_id, text)` of every send, in order.
    pub fn sends(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConnectorCall::Send {
                    conversation_id,
                    activity,
                    ..
                } => Some((conversation_id, activity.text.unwrap_or_default())),
                _ => None,
            })
            .collect()
    }

    /// Activities sent into `conversation_id`.
    pub fn sent_to(&self, conversation_id: &str) -> Vec<OutgoingActivity> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ConnectorCall::Send {
                    conversation_id: id,
                    activity,
                    ..
                } if id == conversation_id => Some(activity),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ConnectorCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn rejected(operation: &'static str) -> herald_msteams::Error {
        herald_msteams::Error::Api {
            operation,
            status: 403,
            body: "rejected by test connector".into(),
        }
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn create_conversation(
        &self,
        service_url: &str,
        params: &ConversationParameters,
    ) -> herald_msteams::Result<ConversationResourceResponse> {
        self.record(ConnectorCall::Create {
            service_url: service_url.to_string(),
            params: params.clone(),
        });
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::rejected("create conversation"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ConversationResourceResponse {
            id: format!("a:conv-{n}"),
            activity_id: Some(format!("act-{n}")),
            service_url: None,
        })
    }

    async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> herald_msteams::Result<ResourceResponse> {
        self.record(ConnectorCall::Send {
            service_url: service_url.to_string(),
            conversation_id: conversation_id.to_string(),
            activity: activity.clone(),
        });
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(Self::rejected("send"));
        }
        Ok(ResourceResponse {
            id: Some(format!("msg-{}", self.calls().len())),
        })
    }

    async fn get_conversation_members(
        &self,
        service_url: &str,
        conversation_id: &str,
    ) -> herald_msteams::Result<Vec<TeamsChannelAccount>> {
        self.record(ConnectorCall::Members {
            service_url: service_url.to_string(),
            conversation_id: conversation_id.to_string(),
        });
        Ok(self
            .members
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Store whose every operation fails as if the backend were unreachable.
/// Counts attempted writes.
#[derive(Default)]
pub struct FailingStore {
    writes: AtomicUsize,
    tables_ok: bool,
}

impl FailingStore {
    /// Accepts table creation so a cache can be opened over it.
    pub fn accepting_tables() -> Self {
        Self {
            tables_ok: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn offline() -> herald_store::Error {
        herald_store::Error::unavailable(std::io::Error::other("store offline"))
    }
}

#[async_trait]
impl TableStore for FailingStore {
    async fn create_table_if_absent(&self, _table: &str) -> herald_store::Result<()> {
        if self.tables_ok {
            Ok(())
        } else {
            Err(Self::offline())
        }
    }

    async fn insert(&self, _table: &str, _entity: Entity) -> herald_store::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Self::offline())
    }

    async fn upsert(&self, _table: &str, _entity: Entity) -> herald_store::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Self::offline())
    }

    async fn retrieve(
        &self,
        _table: &str,
        _partition_key: &str,
        _row_key: &str,
    ) -> herald_store::Result<Entity> {
        Err(Self::offline())
    }
}

/// In-memory store that holds the first `parties` reads of one partition at
/// a barrier until all of them have arrived, and logs the order of writes.
/// Later reads pass straight through.
pub struct GatedStore {
    inner: InMemoryTableStore,
    partition: String,
    parties: usize,
    arrived: AtomicUsize,
    barrier: Barrier,
    writes: Mutex<Vec<Entity>>,
}

impl GatedStore {
    pub fn new(partition: &str, parties: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryTableStore::new(),
            partition: partition.to_string(),
            parties,
            arrived: AtomicUsize::new(0),
            barrier: Barrier::new(parties),
            writes: Mutex::new(Vec::new()),
        })
    }

    /// Every upsert/insert, oldest first.
    pub fn writes(&self) -> Vec<Entity> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn partition_len(&self, table: &str, partition_key: &str) -> usize {
        self.inner.partition_len(table, partition_key)
    }

    fn log(&self, entity: &Entity) {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entity.clone());
    }
}

#[async_trait]
impl TableStore for GatedStore {
    async fn create_table_if_absent(&self, table: &str) -> herald_store::Result<()> {
        self.inner.create_table_if_absent(table).await
    }

    async fn insert(&self, table: &str, entity: Entity) -> herald_store::Result<()> {
        self.log(&entity);
        self.inner.insert(table, entity).await
    }

    async fn upsert(&self, table: &str, entity: Entity) -> herald_store::Result<()> {
        self.log(&entity);
        self.inner.upsert(table, entity).await
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> herald_store::Result<Entity> {
        let result = self.inner.retrieve(table, partition_key, row_key).await;
        if partition_key == self.partition
            && self.arrived.fetch_add(1, Ordering::SeqCst) < self.parties
        {
            self.barrier.wait().await;
        }
        result
    }
}
