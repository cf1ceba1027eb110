//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use acqlink_sdk::client::{
    ClientError, GatewayClient, GatewayHttpRequest, GatewayHttpResponse, GatewayTransport,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::entities::merchant::Merchant;
use crate::entities::payment_transaction::PaymentTransaction;
use crate::entities::{Environment, MerchantStatus, PaymentBrand, TransactionStatus};
use crate::framework::{
    LeasedTask, MerchantStore, NewTask, StoreError, TaskQueue, TransactionStore,
};

pub fn merchant() -> Merchant {
    Merchant {
        id: Uuid::new_v4(),
        name: "Test Shop".to_string(),
        status: MerchantStatus::Active,
        mode: Environment::Test,
        balance: None,
        test_gateway_url: Some("https://gw-test.example.net/api".to_string()),
        test_gateway_mid: Some("TEST-MID".to_string()),
        test_gateway_key: Some("test-key".to_string()),
        test_gateway_api_key: Some("test-api-key".to_string()),
        live_gateway_url: Some("https://gw.example.net/api".to_string()),
        live_gateway_mid: Some("LIVE-MID".to_string()),
        live_gateway_key: Some("live-key".to_string()),
        live_gateway_api_key: None,
    }
}

pub fn pending_transaction(merchant_id: Uuid) -> PaymentTransaction {
    let now = OffsetDateTime::now_utc();
    PaymentTransaction {
        id: Uuid::new_v4(),
        merchant_id: Some(merchant_id),
        order_id: "ORD-1001".to_string(),
        client_id: Some("CLN-001".to_string()),
        status: TransactionStatus::Pending,
        status_description: None,
        environment: None,
        payment_brand: Some(PaymentBrand::UnionPay),
        amount: dec("10.50"),
        balance: None,
        currency: "USD".to_string(),
        reply_url: None,
        backoffice_url: None,
        request_timestamp: Some(now),
        created_at: now,
        request_data: None,
        initial_response_data: None,
        last_query_data: None,
        callback_data: None,
        callback_timestamp: None,
        version: 0,
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Leased,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct StoredTask {
    pub task: LeasedTask,
    pub state: TaskState,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Inner {
    transactions: HashMap<Uuid, PaymentTransaction>,
    merchants: HashMap<Uuid, Merchant>,
    tasks: Vec<StoredTask>,
}

impl Inner {
    fn push(&mut self, task: NewTask) -> Uuid {
        let id = Uuid::new_v4();
        self.tasks.push(StoredTask {
            task: LeasedTask {
                id,
                name: task.name,
                version: task.version,
                pool: task.pool,
                business_key: task.business_key,
                payload: task.payload,
                attempts: 0,
                due_at: task.due_at,
                leased_until: None,
            },
            state: TaskState::Pending,
            last_error: None,
        });
        id
    }
}

/// Implements every store contract over plain maps.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn insert_merchant(&self, merchant: Merchant) {
        self.inner.lock().unwrap().merchants.insert(merchant.id, merchant);
    }

    pub fn insert_transaction(&self, transaction: PaymentTransaction) {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .insert(transaction.id, transaction);
    }

    pub fn transaction(&self, id: Uuid) -> PaymentTransaction {
        self.inner.lock().unwrap().transactions[&id].clone()
    }

    pub fn merchant(&self, id: Uuid) -> Merchant {
        self.inner.lock().unwrap().merchants[&id].clone()
    }

    pub fn tasks(&self) -> Vec<StoredTask> {
        self.inner.lock().unwrap().tasks.clone()
    }

    pub fn tasks_in(&self, state: TaskState) -> Vec<StoredTask> {
        self.tasks().into_iter().filter(|t| t.state == state).collect()
    }

    /// Put a task straight into the queue, bypassing dedup.
    pub fn push_task(&self, task: NewTask) -> Uuid {
        self.inner.lock().unwrap().push(task)
    }

    fn set_state(&self, id: Uuid, state: TaskState, error: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.tasks.iter_mut().find(|t| t.task.id == id) {
            stored.state = state;
            stored.last_error = error.map(str::to_string);
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn find_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>, StoreError> {
        Ok(self.inner.lock().unwrap().transactions.get(&id).cloned())
    }

    async fn find_transaction_by_order(
        &self,
        merchant_id: Uuid,
        order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .values()
            .find(|t| t.merchant_id == Some(merchant_id) && t.order_id == order_id)
            .cloned())
    }

    async fn save_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner
            .transactions
            .get_mut(&transaction.id)
            .filter(|stored| stored.version == transaction.version)
            .ok_or(StoreError::Conflict {
                entity: "payment transaction",
                id: transaction.id,
            })?;
        *stored = transaction.clone();
        stored.version += 1;
        Ok(stored.clone())
    }
}

#[async_trait]
impl MerchantStore for InMemoryStore {
    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        Ok(self.inner.lock().unwrap().merchants.get(&id).cloned())
    }

    async fn find_merchant_by_gateway_mid(&self, mid: &str) -> Result<Option<Merchant>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .merchants
            .values()
            .find(|m| m.environment_of_mid(mid).is_some())
            .cloned())
    }

    async fn update_merchant_balance(&self, id: Uuid, balance: Decimal) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.merchants.get_mut(&id) {
            Some(m) if m.balance != Some(balance) => {
                m.balance = Some(balance);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryStore {
    async fn lease(&self, pool: &str, lease_for: Duration) -> Result<Option<LeasedTask>, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut inner = self.inner.lock().unwrap();
        let candidate = inner
            .tasks
            .iter_mut()
            .filter(|t| t.task.pool == pool)
            .filter(|t| match t.state {
                TaskState::Pending => t.task.due_at <= now,
                TaskState::Leased => t.task.leased_until.is_some_and(|until| until < now),
                _ => false,
            })
            .min_by_key(|t| t.task.due_at);
        Ok(candidate.map(|stored| {
            stored.state = TaskState::Leased;
            stored.task.attempts += 1;
            stored.task.leased_until = Some(now + lease_for);
            stored.task.clone()
        }))
    }

    async fn enqueue_unique(&self, task: NewTask) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner.tasks.iter().any(|t| {
            t.state == TaskState::Pending
                && t.task.name == task.name
                && t.task.business_key == task.business_key
        });
        if duplicate {
            return Ok(false);
        }
        inner.push(task);
        Ok(true)
    }

    async fn complete(&self, task: &LeasedTask) -> Result<(), StoreError> {
        self.set_state(task.id, TaskState::Completed, None);
        Ok(())
    }

    async fn retry_later(
        &self,
        task: &LeasedTask,
        reason: &str,
        due_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(stored) = inner.tasks.iter_mut().find(|t| t.task.id == task.id) {
            stored.state = TaskState::Pending;
            stored.task.due_at = due_at;
            stored.task.leased_until = None;
            stored.last_error = Some(reason.to_string());
        }
        Ok(())
    }

    async fn fail_permanently(&self, task: &LeasedTask, reason: &str) -> Result<(), StoreError> {
        self.set_state(task.id, TaskState::Failed, Some(reason));
        Ok(())
    }
}

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<GatewayHttpResponse, String>>>,
    requests: Mutex<Vec<GatewayHttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Ok(GatewayHttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<GatewayHttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayTransport for ScriptedTransport {
    async fn execute(&self, request: GatewayHttpRequest) -> Result<GatewayHttpResponse, ClientError> {
        self.requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ClientError::Transport(message)),
            None => Err(ClientError::Transport("no scripted response".to_string())),
        }
    }
}

pub fn gateway_client(transport: &Arc<ScriptedTransport>) -> GatewayClient {
    GatewayClient::new(transport.clone())
}

/// A query reply envelope with the given result code and balance.
pub fn query_reply(order_id: &str, result: &str, balance: Option<&str>) -> String {
    let mut reply = serde_json::json!({
        "orderID": order_id,
        "result": result,
        "amount": "10.5",
        "currency": "USD",
        "date": "2025-06-01T10:15:00Z",
        "detail": format!("result {result}"),
    });
    if let Some(balance) = balance {
        reply["balance"] = serde_json::Value::String(balance.to_string());
    }
    serde_json::json!({
        "response": { "statusCode": 200, "message": "OK" },
        "reply": reply,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::PaymentStatusTask;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueues_keep_one_pending_task_per_key() {
        let store = InMemoryStore::default();
        let transaction_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .enqueue_unique(PaymentStatusTask::initial_task(transaction_id, now))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.tasks_in(TaskState::Pending).len(), 1);
    }
}
