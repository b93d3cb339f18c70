// cqlbridge - relational-to-CQL foreign data bridge
// Plans, deparses and executes host scans and modifications against a CQL store

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Relational values, types, relation descriptors and errors
pub mod core;

// Relational <-> wire value codec and protocol value framing
pub mod codec;

// Restriction expressions and the emitted CQL subset
pub mod parser;

// Classification, allow-filtering policy, deparsing, cost and EXPLAIN
pub mod planner;

// Scan and modify state machines, local predicate evaluation
pub mod executor;

// Session collaborators and the in-memory cluster
pub mod connection;

// Server, user mapping and table options
pub mod options;

// system_schema introspection
pub mod import;

pub use core::{
    BridgeError, CodecError, Column, DataType, ExecutorError, OptionError, RelationDescriptor, SchemaError, Value,
    WireError,
};
pub use codec::{decode, encode, WireValue};
pub use connection::{BoundStatement, CancelFlag, ConnectionProvider, MemoryCluster, Session};
pub use executor::{ModifyExecutor, ModifyRow, ScanExecutor};
pub use import::{import_schema, TableFilter};
pub use options::{ConnectionConfig, Consistency};
pub use parser::{parse_restriction, Expr};
pub use planner::{plan, ModifyPlan, OpKind, Plan, Planner, QueryPlan};

pub const VERSION: &str = "1.0.0";
