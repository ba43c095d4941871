use std::sync::Arc;

use futures_util::{
    future,
    stream::{self, BoxStream, Stream, StreamExt},
};
use serde_json::{Map, Value};

use crate::{Error, ExecutionResult, ListCache, Operation};

type ResultWriter = Arc<dyn Fn(&Operation, &Map<String, Value>) -> Result<(), Error> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum LinkError<E> {
    /// The forwarded operation failed, relayed as is.
    #[error(transparent)]
    Transport(E),
    /// A result went through but its lists could not be reconciled.
    #[error(transparent)]
    Reconcile(Error),
}

/// Intercepts the results of forwarded operations and reconciles the lists with each of them
/// before relaying it.
#[derive(Clone)]
pub struct ListCacheLink {
    cache: ListCache,
    writer: Option<ResultWriter>,
}

impl ListCacheLink {
    pub fn new(cache: ListCache) -> Self {
        ListCacheLink { cache, writer: None }
    }

    /// Writes every result data into the store before it is reconciled, for hosts whose store
    /// is not fed by anything else. With an [`InMemoryStore`](crate::InMemoryStore) this is
    /// [`write_operation`](crate::InMemoryStore::write_operation), which stores aliased fields
    /// under their field name.
    ///
    /// A failing write is relayed like a reconciliation failure.
    pub fn with_result_writer(
        mut self,
        writer: impl Fn(&Operation, &Map<String, Value>) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        self.writer = Some(Arc::new(writer));
        self
    }

    pub fn cache(&self) -> &ListCache {
        &self.cache
    }

    /// Forwards `operation` and returns its results.
    ///
    /// A reconciliation failure never drops the result: it is relayed right after it as an
    /// extra `LinkError::Reconcile` item. Dropping the stream stops any further reconciliation.
    pub fn request<F, S, E>(
        &self,
        operation: Operation,
        forward: F,
    ) -> BoxStream<'static, Result<ExecutionResult, LinkError<E>>>
    where
        F: FnOnce(Operation) -> Result<S, E>,
        S: Stream<Item = Result<ExecutionResult, E>> + Send + 'static,
        E: Send + 'static,
    {
        let results = match forward(operation.clone()) {
            Ok(results) => results,
            Err(err) => return stream::once(future::ready(Err(LinkError::Transport(err)))).boxed(),
        };

        let link = self.clone();

        results
            .flat_map(move |item| {
                let items = match item {
                    Ok(result) => match link.reconcile(&operation, &result) {
                        Ok(()) => vec![Ok(result)],
                        Err(err) => {
                            tracing::debug!("lists could not be reconciled: {err}");
                            vec![Ok(result), Err(LinkError::Reconcile(err))]
                        }
                    },
                    Err(err) => vec![Err(LinkError::Transport(err))],
                };

                stream::iter(items)
            })
            .boxed()
    }

    fn reconcile(&self, operation: &Operation, result: &ExecutionResult) -> Result<(), Error> {
        let Some(Value::Object(data)) = &result.data else {
            return Ok(());
        };

        if let Some(writer) = &self.writer {
            writer(operation, data)?;
        }

        self.cache.reconcile(operation, data)?;

        Ok(())
    }
}

impl std::fmt::Debug for ListCacheLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListCacheLink")
            .field("cache", &self.cache)
            .field("writes_results", &self.writer.is_some())
            .finish()
    }
}
