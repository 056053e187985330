//! The call forwarder.
//!
//! [`ProxyApplication`] passes every protocol call to the downstream
//! application unchanged, except end-block: after the downstream answers,
//! the validator updates scheduled for that height are appended to its
//! diffs.

use crate::application::{AbciError, Application};
use crate::metrics;
use abci_proxy_scheduler::ValidatorScheduler;
use abci_proxy_types::abci::{
    RequestBeginBlock, RequestCheckTx, RequestDeliverTx, RequestEndBlock, RequestInfo,
    RequestInitChain, RequestQuery, RequestSetOption, ResponseBeginBlock, ResponseCheckTx,
    ResponseCommit, ResponseDeliverTx, ResponseEndBlock, ResponseInfo, ResponseInitChain,
    ResponseQuery, ResponseSetOption, TxResult,
};
use abci_proxy_types::BlockHeight;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, warn};

/// Forwards protocol calls to `next` and injects scheduled validator updates.
///
/// At end-block the downstream application's own diffs are kept and the
/// scheduled updates for that height are appended after them; they do not
/// replace what the application returned.
pub struct ProxyApplication<C> {
    next: C,
    // Only touched from protocol callbacks, which the server serializes, and
    // never held across an await.
    scheduler: Mutex<ValidatorScheduler>,
    echo_prefix: Option<Vec<u8>>,
}

impl<C: Application> ProxyApplication<C> {
    pub fn new(next: C, scheduler: ValidatorScheduler) -> Self {
        Self {
            next,
            scheduler: Mutex::new(scheduler),
            echo_prefix: None,
        }
    }

    /// Answer CheckTx/DeliverTx locally when the payload starts with `prefix`.
    /// An empty prefix disables echoing.
    pub fn with_echo_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        self.echo_prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// The downstream application.
    pub fn downstream(&self) -> &C {
        &self.next
    }

    /// Height of the last end-block seen.
    pub fn last_height(&self) -> BlockHeight {
        self.scheduler.lock().last_height()
    }

    /// Number of heights with pending validator changes.
    pub fn pending_heights(&self) -> usize {
        self.scheduler.lock().pending_heights()
    }

    fn echo(&self, tx: &[u8]) -> Option<TxResult> {
        let rest = tx.strip_prefix(self.echo_prefix.as_deref()?)?;
        metrics::record_echoed_transaction();
        Some(TxResult::ok_with(
            Vec::new(),
            format!("Echo: {}", String::from_utf8_lossy(rest)),
        ))
    }

    async fn forward<T>(
        &self,
        method: &'static str,
        call: impl Future<Output = Result<T, AbciError>>,
    ) -> Result<T, AbciError> {
        let start = Instant::now();
        let result = call.await;
        metrics::record_forwarded_call(method, start.elapsed().as_secs_f64(), result.is_err());
        if let Err(e) = &result {
            warn!(method, error = %e, "Downstream call failed");
        }
        result
    }
}

#[async_trait]
impl<C: Application> Application for ProxyApplication<C> {
    async fn info(&self, request: RequestInfo) -> Result<ResponseInfo, AbciError> {
        debug!(version = %request.version, "info");
        self.forward("info", self.next.info(request)).await
    }

    async fn set_option(&self, request: RequestSetOption) -> Result<ResponseSetOption, AbciError> {
        debug!(key = %request.key, value = %request.value, "set_option");
        self.forward("set_option", self.next.set_option(request))
            .await
    }

    async fn deliver_tx(&self, request: RequestDeliverTx) -> Result<ResponseDeliverTx, AbciError> {
        debug!(tx = %hex::encode(&request.tx), "deliver_tx");
        if let Some(echoed) = self.echo(&request.tx) {
            return Ok(echoed);
        }
        self.forward("deliver_tx", self.next.deliver_tx(request))
            .await
    }

    async fn check_tx(&self, request: RequestCheckTx) -> Result<ResponseCheckTx, AbciError> {
        debug!(tx = %hex::encode(&request.tx), "check_tx");
        if let Some(echoed) = self.echo(&request.tx) {
            return Ok(echoed);
        }
        self.forward("check_tx", self.next.check_tx(request)).await
    }

    async fn commit(&self) -> Result<ResponseCommit, AbciError> {
        debug!("commit");
        self.forward("commit", self.next.commit()).await
    }

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AbciError> {
        debug!(
            path = %request.path,
            data = %hex::encode(&request.data),
            height = request.height,
            prove = request.prove,
            "query"
        );
        self.forward("query", self.next.query(request)).await
    }

    async fn init_chain(&self, request: RequestInitChain) -> Result<ResponseInitChain, AbciError> {
        debug!(validators = ?request.validators, "init_chain");
        self.forward("init_chain", self.next.init_chain(request))
            .await
    }

    async fn begin_block(
        &self,
        request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, AbciError> {
        debug!(
            hash = %hex::encode(&request.hash),
            height = %request.header.height,
            chain_id = %request.header.chain_id,
            "begin_block"
        );
        self.forward("begin_block", self.next.begin_block(request))
            .await
    }

    async fn end_block(&self, request: RequestEndBlock) -> Result<ResponseEndBlock, AbciError> {
        let height = request.height;
        debug!(height = %height, "end_block");

        // A failed downstream end-block leaves the scheduler untouched, so
        // the engine can retry the boundary.
        let mut response = self
            .forward("end_block", self.next.end_block(request))
            .await?;

        let (applied, pending) = {
            let mut scheduler = self.scheduler.lock();
            let applied = scheduler.on_end_block(height);
            (applied, scheduler.pending_heights())
        };
        metrics::record_end_block(&applied, pending);

        response.diffs.extend(applied.validators);
        Ok(response)
    }
}
