//! Keeps "all entities of one type" lists in a normalized GraphQL client cache.
//!
//! Types take part by declaring a fragment: the fields an entity needs before it can be listed.
//! Each operation result then goes through two steps:
//!
//! 1. The walker matches the operation's selections against the result and collects every
//!    entity of a declared type whose fragment the store can already serve.
//! 2. The synchronizer merges those entities into the stored list of their type.
//!
//! On top of that the crate builds read and remove resolvers for every declared type, joins of
//! a list onto a parent value, and a link that reconciles every result flowing through it.
//!
//! The store itself is a collaborator behind the [`Store`] trait, [`InMemoryStore`] being a
//! simple implementation of it.

mod cache;
mod collector;
mod config;
mod connection;
mod declarations;
mod error;
mod join;
mod link;
mod operation;
mod parser_extensions;
mod registry;
mod removal;
mod store;
mod synchronizer;
mod walker;

pub use self::{
    cache::{ListCache, ListCacheBuilder},
    collector::EntityCollector,
    config::{KeyNaming, ListCacheConfig},
    connection::{ConnectionRecord, EntityReference, ListNode},
    declarations::{CacheableTypeDeclaration, CacheableTypes},
    error::{Error, StoreError},
    join::{JoinAccessor, JoinDescriptor},
    link::{LinkError, ListCacheLink},
    operation::{ExecutionResult, Operation},
    registry::{Resolver, ResolverArgs, ResolverRegistry},
    store::{default_identify, CacheKey, InMemoryStore, Store},
    synchronizer::synchronize,
};
