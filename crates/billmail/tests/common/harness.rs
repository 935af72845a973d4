//! Test harness running the orchestrator against in-memory collaborators.
//!
//! - `FakeAnalyzer` answers by looking for marker words in the text
//! - `RecordingTransport` keeps every accepted message and can be told to fail
//! - `TestHarness` owns a memory store and builds a fresh orchestrator per run

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use billmail::analyzer::{
    AnalyzerError, BillingFields, Classification, Confidence, DocumentAnalyzer, DocumentType,
    VisionReader,
};
use billmail::delivery::{DeliveryError, MailTransport, OutboundMessage};
use billmail::email::EmailSignature;
use billmail::error::StorageError;
use billmail::ledger::{Ledger, LedgerStore, ProcessedRecord, SentRecord};
use billmail::pipeline::{Dispatcher, InvocationSummary, Orchestrator, OrchestratorSettings};
use billmail::processor::PreparedImage;
use billmail::storage::{
    MemoryObjectStore, ObjectMeta, ObjectStore, ObjectVersion, StoredObject, WriteCondition,
};

/// Text marking a document the classifier rejects.
pub const NOT_A_BILL: &str = "NOT-A-BILL";
/// Text making the classification call fail.
pub const CLASSIFY_FAIL: &str = "CLASSIFY-FAIL";
/// Text making the extraction call fail.
pub const EXTRACT_FAIL: &str = "EXTRACT-FAIL";

/// Analyzer whose answers are driven by marker words in the text.
///
/// Extraction returns the trimmed text as `bill_id` so results can be traced
/// back to their document.
pub struct FakeAnalyzer {
    pub classify_calls: AtomicUsize,
    pub extract_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    image_text: Mutex<String>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            classify_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
            image_text: Mutex::new("Receipt RCPT-9 total 12.50".to_string()),
        }
    }

    /// Sets what the vision call reads from every image.
    pub fn set_image_text(&self, text: &str) {
        *self.image_text.lock().unwrap() = text.to_string();
    }

    pub fn extract_count(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentAnalyzer for FakeAnalyzer {
    async fn classify(&self, text: &str) -> Result<Classification, AnalyzerError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(CLASSIFY_FAIL) {
            return Err(AnalyzerError::Http {
                status: 400,
                body: "bad request".to_string(),
            });
        }
        let document_type = if text.contains(NOT_A_BILL) {
            DocumentType::Other
        } else {
            DocumentType::BillInvoice
        };
        Ok(Classification {
            document_type,
            confidence: Confidence::High,
            reason: "fake".to_string(),
        })
    }

    async fn extract_fields(&self, text: &str) -> Result<BillingFields, AnalyzerError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if text.contains(EXTRACT_FAIL) {
            return Err(AnalyzerError::RateLimited {
                body: "slow down".to_string(),
            });
        }
        Ok(BillingFields {
            bill_id: text.trim().to_string(),
            bill_from: "Acme, Inc.".to_string(),
            total_amount: "100.00".to_string(),
            currency: "USD".to_string(),
            ..Default::default()
        })
    }

    async fn image_text(&self, _image: &PreparedImage) -> Result<String, AnalyzerError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.image_text.lock().unwrap().clone())
    }
}

/// Transport that records accepted messages.
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
    pub attempts: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        // Make sure the message would build as MIME.
        message.to_mime()?;
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Store wrapper whose listing or reads can be made to fail.
pub struct FlakyStore {
    pub inner: Arc<MemoryObjectStore>,
    pub fail_list: AtomicBool,
    /// Reads of keys containing this text fail.
    pub fail_get_containing: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryObjectStore>) -> Self {
        Self {
            inner,
            fail_list: AtomicBool::new(false),
            fail_get_containing: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StorageError::List {
                prefix: prefix.to_string(),
                reason: "bucket unavailable".to_string(),
            });
        }
        self.inner.list(prefix).await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let failing = self.fail_get_containing.lock().unwrap().clone();
        if let Some(fragment) = failing {
            if key.contains(&fragment) {
                return Err(StorageError::Read {
                    key: key.to_string(),
                    source: std::io::Error::other("read timed out"),
                });
            }
        }
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        body: &[u8],
        condition: WriteCondition,
    ) -> Result<ObjectVersion, StorageError> {
        self.inner.put(key, body, condition).await
    }
}

/// Isolated environment for orchestrator runs.
pub struct TestHarness {
    pub memory: Arc<MemoryObjectStore>,
    pub store: Arc<FlakyStore>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub transport: Arc<RecordingTransport>,
    pub conditional_writes: bool,
}

impl TestHarness {
    pub fn new() -> Self {
        let memory = Arc::new(MemoryObjectStore::new());
        Self {
            store: Arc::new(FlakyStore::new(Arc::clone(&memory))),
            memory,
            analyzer: Arc::new(FakeAnalyzer::new()),
            transport: Arc::new(RecordingTransport::new()),
            conditional_writes: false,
        }
    }

    pub fn with_conditional_writes(mut self) -> Self {
        self.conditional_writes = true;
        self
    }

    /// Stores a raw email under `Emails/<name>`.
    pub fn add_email(&self, name: &str, raw: Vec<u8>) -> String {
        let key = format!("Emails/{}", name);
        self.memory.insert(key.clone(), raw);
        key
    }

    pub fn dispatcher(&self) -> Dispatcher {
        let analyzer: Arc<dyn DocumentAnalyzer> = self.analyzer.clone();
        Dispatcher::new(Arc::clone(&analyzer), Arc::new(VisionReader::new(analyzer)))
    }

    /// A fresh orchestrator, as a new invocation would build it.
    pub fn orchestrator(&self) -> Orchestrator {
        let store: Arc<dyn ObjectStore> = self.store.clone();
        Orchestrator::new(
            Arc::clone(&store),
            LedgerStore::new(store, self.conditional_writes),
            self.dispatcher(),
            self.transport.clone(),
            OrchestratorSettings::default(),
        )
    }

    pub async fn run(&self) -> InvocationSummary {
        self.orchestrator().run().await
    }

    pub async fn processed(&self) -> Ledger<ProcessedRecord> {
        LedgerStore::new(self.memory.clone(), false).load().await
    }

    pub async fn sent(&self) -> Ledger<SentRecord> {
        LedgerStore::new(self.memory.clone(), false).load().await
    }

    /// Keys under the report prefix.
    pub fn reports(&self) -> Vec<String> {
        self.memory
            .keys()
            .into_iter()
            .filter(|k| k.starts_with("processed_invoices/"))
            .collect()
    }

    /// CSV attached to a sent message, as text.
    pub fn attached_csv(message: &OutboundMessage) -> String {
        let attachment = message.attachment.as_ref().expect("message has a CSV");
        String::from_utf8(attachment.data.clone()).expect("CSV is UTF-8")
    }
}

pub fn signature(value: &str) -> EmailSignature {
    EmailSignature::from(value.to_string())
}
