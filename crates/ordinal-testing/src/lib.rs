//! Testing infrastructure for the ordinal coordination recipes.
//!
//! ## In-Memory Ensemble (Fast, Deterministic)
//!
//! - `InMemoryEnsemble`: a single-process stand-in for a coordination store
//!   ensemble with persistent, ephemeral, and sequential nodes, versioned
//!   compare-and-swap writes, and one-shot watches
//! - `InMemoryConnector`: a `SessionConnector` that opens sessions on an
//!   ensemble, with controllable connect behaviour
//! - Fault injection: queue store errors against specific operations, expire
//!   sessions, or interrupt writes after they commit
//!
//! # Usage
//!
//! ```ignore
//! let ensemble = InMemoryEnsemble::new();
//! let connector = ensemble.connector();
//!
//! // Fail the next two reads with connection loss
//! ensemble.inject(Fault::before(OpKind::GetData, StoreError::ConnectionLoss).times(2));
//!
//! // Expire every live session, removing their ephemeral nodes
//! ensemble.expire_all_sessions();
//! ```

mod ensemble;

pub use ensemble::ConnectBehavior;
pub use ensemble::Fault;
pub use ensemble::FaultTiming;
pub use ensemble::InMemoryConnector;
pub use ensemble::InMemoryEnsemble;
pub use ensemble::InMemorySession;
pub use ensemble::NullWatcher;
pub use ensemble::OpKind;
