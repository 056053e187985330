//! The protocol surface shared by the proxy, its downstream client and
//! test applications.

use crate::codec::CodecError;
use abci_proxy_types::abci::{
    Request, RequestBeginBlock, RequestCheckTx, RequestDeliverTx, RequestEndBlock,
    RequestInfo, RequestInitChain, RequestQuery, RequestSetOption, Response,
    ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEcho,
    ResponseEndBlock, ResponseException, ResponseInfo, ResponseInitChain, ResponseQuery,
    ResponseSetOption,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure of a protocol call.
#[derive(Debug, Error)]
pub enum AbciError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("connection to {0} closed")]
    Disconnected(String),

    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        method: &'static str,
        timeout: Duration,
    },

    #[error("application exception: {0}")]
    Exception(String),

    #[error("unexpected response to {expected}: got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
}

/// An ABCI application.
///
/// Every method has a default that returns an empty successful response, so
/// implementors only override what they care about. Echo and flush never
/// reach an application: the server answers them itself.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    async fn info(&self, _request: RequestInfo) -> Result<ResponseInfo, AbciError> {
        Ok(ResponseInfo::default())
    }

    async fn set_option(
        &self,
        _request: RequestSetOption,
    ) -> Result<ResponseSetOption, AbciError> {
        Ok(ResponseSetOption::default())
    }

    async fn deliver_tx(
        &self,
        _request: RequestDeliverTx,
    ) -> Result<ResponseDeliverTx, AbciError> {
        Ok(ResponseDeliverTx::ok())
    }

    async fn check_tx(&self, _request: RequestCheckTx) -> Result<ResponseCheckTx, AbciError> {
        Ok(ResponseCheckTx::ok())
    }

    async fn commit(&self) -> Result<ResponseCommit, AbciError> {
        Ok(ResponseCommit::ok())
    }

    async fn query(&self, _request: RequestQuery) -> Result<ResponseQuery, AbciError> {
        Ok(ResponseQuery::default())
    }

    async fn init_chain(
        &self,
        _request: RequestInitChain,
    ) -> Result<ResponseInitChain, AbciError> {
        Ok(ResponseInitChain::default())
    }

    async fn begin_block(
        &self,
        _request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, AbciError> {
        Ok(ResponseBeginBlock::default())
    }

    async fn end_block(&self, _request: RequestEndBlock) -> Result<ResponseEndBlock, AbciError> {
        Ok(ResponseEndBlock::default())
    }
}

#[async_trait]
impl<A: Application + ?Sized> Application for Arc<A> {
    async fn info(&self, request: RequestInfo) -> Result<ResponseInfo, AbciError> {
        (**self).info(request).await
    }

    async fn set_option(&self, request: RequestSetOption) -> Result<ResponseSetOption, AbciError> {
        (**self).set_option(request).await
    }

    async fn deliver_tx(&self, request: RequestDeliverTx) -> Result<ResponseDeliverTx, AbciError> {
        (**self).deliver_tx(request).await
    }

    async fn check_tx(&self, request: RequestCheckTx) -> Result<ResponseCheckTx, AbciError> {
        (**self).check_tx(request).await
    }

    async fn commit(&self) -> Result<ResponseCommit, AbciError> {
        (**self).commit().await
    }

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AbciError> {
        (**self).query(request).await
    }

    async fn init_chain(&self, request: RequestInitChain) -> Result<ResponseInitChain, AbciError> {
        (**self).init_chain(request).await
    }

    async fn begin_block(
        &self,
        request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, AbciError> {
        (**self).begin_block(request).await
    }

    async fn end_block(&self, request: RequestEndBlock) -> Result<ResponseEndBlock, AbciError> {
        (**self).end_block(request).await
    }
}

/// Route `request` to the matching method of `app`.
///
/// Echo and flush are answered here. An application error becomes
/// [`Response::Exception`] carrying the error text.
pub async fn dispatch<A: Application + ?Sized>(app: &A, request: Request) -> Response {
    let result = match request {
        Request::Echo(r) => Ok(Response::Echo(ResponseEcho { message: r.message })),
        Request::Flush => Ok(Response::Flush),
        Request::Info(r) => app.info(r).await.map(Response::Info),
        Request::SetOption(r) => app.set_option(r).await.map(Response::SetOption),
        Request::DeliverTx(r) => app.deliver_tx(r).await.map(Response::DeliverTx),
        Request::CheckTx(r) => app.check_tx(r).await.map(Response::CheckTx),
        Request::Commit => app.commit().await.map(Response::Commit),
        Request::Query(r) => app.query(r).await.map(Response::Query),
        Request::InitChain(r) => app.init_chain(r).await.map(Response::InitChain),
        Request::BeginBlock(r) => app.begin_block(r).await.map(Response::BeginBlock),
        Request::EndBlock(r) => app.end_block(r).await.map(Response::EndBlock),
    };

    result.unwrap_or_else(|e| {
        Response::Exception(ResponseException {
            error: e.to_string(),
        })
    })
}
