//! refmat derives graph edges that loaders could not write directly and persists them into a
//! [Redb](https://github.com/cberner/redb) backed entity store.
//!
//! A [`DerivedEdgeSpec`] declares a 2- or 3-way join over the stored graph. The [`Materializer`]
//! plans it against the [`Schema`], streams the ordered rows through the [`aggregate::Grouped`]
//! aggregator, writes the target field onto copy-on-write clones of the leading entities and
//! commits each pass in one transaction. A [`Pipeline`] runs passes in their declared order.
//!

pub mod aggregate;
pub mod batch;
pub mod entity;
pub mod error;
pub mod field_registry;
pub mod logger;
pub mod materialize;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod settings;
pub mod storage;
pub mod updater;

pub use aggregate::{Group, Grouped, Lead};
pub use batch::Batch;
pub use chrono;
pub use config;
pub use entity::{EntityId, EntityRecord, FieldValue, Scalar};
pub use error::{AppError, PartialFieldError};
pub use field_registry::{FieldAccessor, FieldRegistry};
pub use materialize::{Materializer, StageReport};
pub use pipeline::{Pipeline, PipelineFailure, PipelineReport, Step};
pub use query::{Cardinality, DerivedEdgeSpec, GraphView, GroupBy, JoinPath, JoinQuery, Link, ReplicateSpec, Row, WriteMode};
pub use rand;
pub use redb;
pub use schema::{ClassDescriptor, FieldDescriptor, FieldKind, Schema, SchemaBuilder};
pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use settings::{load_config, MaterializeSettings, StoreSettings};
pub use std::sync::Arc;
pub use storage::{ClassStats, EntityStore, ObjectCache, Results, Snapshot, Storage, StoreTx, WriteTx};
pub use updater::{CopyOnWrite, Diagnostic, Update};
