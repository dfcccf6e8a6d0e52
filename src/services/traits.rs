use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::core::errors::GatewayResult;
use crate::models::artifact::{ArtifactLocation, ListingLine};
use crate::models::job::JobDescriptor;

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send + 'a>>;

/// Upload, list and delete against the distributed store. Implementations
/// differ only in how they reach the store; the error contract is shared.
pub trait StoreClient: Send + Sync {
    fn backend(&self) -> &'static str;

    fn upload<'a>(&'a self, path: &'a str, content: Bytes) -> RemoteFuture<'a, ArtifactLocation>;

    fn list<'a>(&'a self, path: &'a str) -> RemoteFuture<'a, Vec<ListingLine>>;

    fn delete<'a>(&'a self, path: &'a str, recursive: bool) -> RemoteFuture<'a, bool>;
}

/// Hands a job to the cluster and returns as soon as it is accepted. The
/// returned value is the resource manager's own application id, when it
/// reports one.
pub trait JobSubmitter: Send + Sync {
    fn backend(&self) -> &'static str;

    fn submit<'a>(&'a self, descriptor: &'a JobDescriptor) -> RemoteFuture<'a, Option<String>>;
}
