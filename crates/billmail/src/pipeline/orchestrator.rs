//! One invocation over the inbound email listing.
//!
//! Each email is looked up in two ledgers. The processed ledger says whether
//! its attachments went through extraction, the sent ledger whether the
//! sender received the results:
//!
//! | processed | sent | action                                  |
//! |-----------|------|-----------------------------------------|
//! | yes       | yes  | skip                                    |
//! | yes       | no   | dispatch again, deliver                 |
//! | no        | yes  | dispatch, record processed, no delivery |
//! | no        | no   | dispatch, record processed, deliver     |
//!
//! A signature seen earlier in the same run is skipped, so copies of one
//! email under several keys are handled once.
//!
//! Results are delivered once per sender after every email was visited, and
//! a signature is only recorded as sent once the transport accepted the
//! message carrying its results.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::delivery::csv::render_results;
use crate::delivery::notice::{no_attachments_message, results_message};
use crate::delivery::MailTransport;
use crate::email::{EmailError, EmailParser, EmailSignature, ParsedEmail};
use crate::ledger::{LedgerStore, ProcessedLedger, ProcessedRecord, SentLedger, SentRecord};
use crate::storage::{ObjectMeta, ObjectStore, WriteCondition};

use super::dispatcher::Dispatcher;
use super::result::DocumentResult;
use super::summary::{FailedFile, FileSummary, InvocationSummary, SAMPLE_RESULTS};

/// Object suffixes under the email prefix that are never emails.
const IGNORED_SUFFIXES: [&str; 3] = [".csv", ".json", ".log"];

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Prefix listed for inbound emails.
    pub email_prefix: String,
    /// Prefix CSV artifacts are written under.
    pub report_prefix: String,
    /// Sender address of outbound messages.
    pub from_address: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            email_prefix: "Emails/".to_string(),
            report_prefix: "processed_invoices/".to_string(),
            from_address: "noreply@yourdomain.com".to_string(),
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    ledgers: LedgerStore,
    parser: EmailParser,
    dispatcher: Dispatcher,
    transport: Arc<dyn MailTransport>,
    settings: OrchestratorSettings,
}

/// Results owed to one sender.
struct SenderBatch {
    sender: String,
    subject: String,
    results: Vec<DocumentResult>,
    emails: Vec<(EmailSignature, String, usize)>,
}

/// Mutable state of a single invocation.
struct RunState {
    processed: ProcessedLedger,
    sent: SentLedger,
    previously_processed: usize,
    previously_sent: usize,
    total_emails_found: usize,
    new_emails_processed: usize,
    emails_sent_this_run: usize,
    delivery_failures: usize,
    results: Vec<DocumentResult>,
    failed_files: Vec<FailedFile>,
    batches: Vec<SenderBatch>,
    /// Signatures already handled this run, whatever key they came from.
    seen: HashSet<EmailSignature>,
}

impl RunState {
    fn queue(&mut self, sender: &str, subject: &str, signature: EmailSignature, results: &[DocumentResult]) {
        let index = match self.batches.iter().position(|b| b.sender == sender) {
            Some(index) => index,
            None => {
                self.batches.push(SenderBatch {
                    sender: sender.to_string(),
                    subject: subject.to_string(),
                    results: Vec::new(),
                    emails: Vec::new(),
                });
                self.batches.len() - 1
            }
        };
        let batch = &mut self.batches[index];
        batch.results.extend_from_slice(results);
        batch.emails.push((signature, subject.to_string(), results.len()));
    }

    fn into_summary(self, status_code: u16, message: String, error: Option<String>) -> InvocationSummary {
        InvocationSummary {
            status_code,
            message,
            new_emails_processed: self.new_emails_processed,
            total_emails_found: self.total_emails_found,
            previously_processed: self.previously_processed,
            previously_sent: self.previously_sent,
            emails_sent_this_run: self.emails_sent_this_run,
            delivery_failures: self.delivery_failures,
            summary: FileSummary::of(&self.results),
            sample_results: self.results.iter().take(SAMPLE_RESULTS).cloned().collect(),
            failed_files: self.failed_files,
            error,
        }
    }
}

/// Whether a listed object is an inbound email rather than the prefix
/// placeholder, an empty object or a stray artifact.
fn is_email_object(meta: &ObjectMeta, prefix: &str) -> bool {
    if meta.key == prefix || meta.size == 0 {
        return false;
    }
    let filename = meta.key.rsplit('/').next().unwrap_or(&meta.key).to_lowercase();
    !IGNORED_SUFFIXES.iter().any(|suffix| filename.ends_with(suffix))
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        ledgers: LedgerStore,
        dispatcher: Dispatcher,
        transport: Arc<dyn MailTransport>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            ledgers,
            parser: EmailParser::new(),
            dispatcher,
            transport,
            settings,
        }
    }

    /// Runs one invocation. Operational failures are reported in the summary.
    pub async fn run(&self) -> InvocationSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("invocation", run_id = %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> InvocationSummary {
        let started = Utc::now();

        let processed: ProcessedLedger = self.ledgers.load().await;
        let sent: SentLedger = self.ledgers.load().await;
        let mut state = RunState {
            previously_processed: processed.len(),
            previously_sent: sent.len(),
            processed,
            sent,
            total_emails_found: 0,
            new_emails_processed: 0,
            emails_sent_this_run: 0,
            delivery_failures: 0,
            results: Vec::new(),
            failed_files: Vec::new(),
            batches: Vec::new(),
            seen: HashSet::new(),
        };

        // Step 1: List inbound emails
        let listing = match self.store.list(&self.settings.email_prefix).await {
            Ok(listing) => listing,
            Err(e) => {
                let message = format!("Error in main processing: {}", e);
                error!("{}", message);
                return state.into_summary(500, message.clone(), Some(message));
            }
        };
        let emails: Vec<ObjectMeta> = listing
            .into_iter()
            .filter(|meta| is_email_object(meta, &self.settings.email_prefix))
            .collect();
        state.total_emails_found = emails.len();
        info!(
            "Found {} email files under {}",
            emails.len(),
            self.settings.email_prefix
        );

        if emails.is_empty() {
            return state.into_summary(200, "No email files found to process".to_string(), None);
        }

        // Step 2: Reconcile and dispatch each email
        for meta in &emails {
            let span = info_span!("email", key = %meta.key);
            self.process_email(&meta.key, &mut state).instrument(span).await;
        }

        info!(
            "{} emails found, {} new, {} previously processed, {} previously sent, {} senders awaiting results",
            state.total_emails_found,
            state.new_emails_processed,
            state.previously_processed,
            state.previously_sent,
            state.batches.len()
        );

        // Step 3: Deliver results per sender
        let batches = std::mem::take(&mut state.batches);
        for batch in batches {
            self.deliver(batch, started, &mut state).await;
        }

        // Step 4: Run-wide report
        if !state.results.is_empty() {
            let key = format!(
                "{}run_{}.csv",
                self.settings.report_prefix,
                started.format("%Y%m%d_%H%M%S")
            );
            self.store_report(&key, render_results(&state.results).as_bytes())
                .await;
        }

        let message = format!(
            "Processing complete. {} NEW emails processed, {} emails had results sent",
            state.new_emails_processed, state.emails_sent_this_run
        );
        info!("{}", message);
        state.into_summary(200, message, None)
    }

    async fn fetch(&self, key: &str) -> Result<ParsedEmail, EmailError> {
        let object = self
            .store
            .get(key)
            .await
            .map_err(|e| EmailError::FetchFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| EmailError::Missing(key.to_string()))?;
        self.parser.parse(&object.body, key)
    }

    async fn process_email(&self, key: &str, state: &mut RunState) {
        let parsed = match self.fetch(key).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Failed to extract email info from {}: {}", key, e);
                state.failed_files.push(FailedFile {
                    file: key.to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let ParsedEmail {
            envelope,
            attachments,
        } = parsed;
        let signature = EmailSignature::of(&envelope);
        if !state.seen.insert(signature.clone()) {
            info!("Skipping {}: {} already handled this run", key, signature);
            return;
        }
        let already_processed = state.processed.contains(&signature);
        let already_sent = state.sent.contains(&signature);
        debug!(
            "From {} ({}), signature {}, {} attachments",
            envelope.sender,
            envelope.subject,
            signature,
            attachments.len()
        );

        match (already_processed, already_sent) {
            (true, true) => {
                info!("Skipping {}: already processed and sent", signature);
                return;
            }
            (true, false) => info!("{} processed but results not sent, reprocessing", signature),
            (false, _) => {
                info!("New email {}", signature);
                state.new_emails_processed += 1;
            }
        }

        let attachment_count = attachments.len();
        let record = ProcessedRecord {
            email_key: key.to_string(),
            sender_email: envelope.sender.clone(),
            subject: envelope.subject.clone(),
            message_id: envelope.message_id.clone(),
            attachment_count,
            ..Default::default()
        };

        if attachments.is_empty() {
            info!("No valid attachments found");
            if !already_sent && !envelope.sender.is_empty() {
                self.send_notice(&envelope.sender, &envelope.subject, signature.clone(), state)
                    .await;
            }
            if !already_processed {
                self.mark_processed(signature, record, 0, state).await;
            }
            return;
        }

        let mut email_results = Vec::new();
        for (i, attachment) in attachments.into_iter().enumerate() {
            info!(
                "Processing attachment {}/{}: {}",
                i + 1,
                attachment_count,
                attachment.filename
            );
            let results = self
                .dispatcher
                .dispatch(&attachment.filename, attachment.content)
                .await;
            debug!("Got {} results from {}", results.len(), attachment.filename);
            email_results.extend(results);
        }

        if !email_results.is_empty() && !already_sent {
            if envelope.sender.is_empty() {
                warn!("{} has no sender address, results will not be delivered", key);
            } else {
                state.queue(&envelope.sender, &envelope.subject, signature.clone(), &email_results);
            }
        }

        let results_count = email_results.len();
        state.results.extend(email_results);
        if !already_processed {
            self.mark_processed(signature, record, results_count, state).await;
        }
    }

    async fn mark_processed(
        &self,
        signature: EmailSignature,
        mut record: ProcessedRecord,
        results_count: usize,
        state: &mut RunState,
    ) {
        record.processed_date = Utc::now().to_rfc3339();
        record.processing_results_count = results_count;
        if let Err(e) = self.ledgers.record(&mut state.processed, signature.clone(), record).await {
            error!("Failed to record {} as processed: {}", signature, e);
        }
    }

    async fn mark_sent(
        &self,
        signature: EmailSignature,
        sender: &str,
        subject: &str,
        results_count: usize,
        state: &mut RunState,
    ) {
        let record = SentRecord {
            sender_email: sender.to_string(),
            subject: subject.to_string(),
            sent_date: Utc::now().to_rfc3339(),
            results_count,
            ..Default::default()
        };
        if let Err(e) = self.ledgers.record(&mut state.sent, signature.clone(), record).await {
            // The message already went out; the next run will send it again.
            error!(
                "Delivered results for {} but could not record it as sent: {}",
                signature, e
            );
        }
    }

    async fn send_notice(
        &self,
        sender: &str,
        subject: &str,
        signature: EmailSignature,
        state: &mut RunState,
    ) {
        let message = no_attachments_message(&self.settings.from_address, sender, subject, Utc::now());
        match self.transport.send(&message).await {
            Ok(()) => {
                state.emails_sent_this_run += 1;
                self.mark_sent(signature, sender, subject, 0, state).await;
            }
            Err(e) => {
                state.delivery_failures += 1;
                warn!("Failed to send no-attachments notice to {}: {}", sender, e);
            }
        }
    }

    async fn deliver(&self, batch: SenderBatch, started: DateTime<Utc>, state: &mut RunState) {
        info!(
            "Sending {} results from {} email(s) to {}",
            batch.results.len(),
            batch.emails.len(),
            batch.sender
        );

        let local_part = batch
            .sender
            .split('@')
            .next()
            .unwrap_or_default()
            .replace('/', "_");
        let csv_filename = format!(
            "invoice_data_{}_{}.csv",
            started.format("%Y%m%d_%H%M%S"),
            local_part
        );
        let csv = render_results(&batch.results).into_bytes();
        self.store_report(
            &format!("{}{}", self.settings.report_prefix, csv_filename),
            &csv,
        )
        .await;

        let message = results_message(
            &self.settings.from_address,
            &batch.sender,
            &batch.subject,
            &csv_filename,
            csv,
            Utc::now(),
        );
        if let Err(e) = self.transport.send(&message).await {
            state.delivery_failures += 1;
            warn!(
                "Failed to send results to {}, will retry next run: {}",
                batch.sender, e
            );
            return;
        }

        state.emails_sent_this_run += 1;
        for (signature, subject, results_count) in batch.emails {
            self.mark_sent(signature, &batch.sender, &subject, results_count, state)
                .await;
        }
    }

    async fn store_report(&self, key: &str, body: &[u8]) {
        match self.store.put(key, body, WriteCondition::Always).await {
            Ok(_) => info!("Saved CSV to {}", key),
            Err(e) => warn!("Could not save CSV to {}: {}", key, e),
        }
    }
}
