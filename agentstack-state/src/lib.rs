//! AgentStack State Management
//!
//! Records which resources of a stack were deployed, so later runs can
//! compute a change-set and resolve outputs against known attributes.
//!
//! - **StateFile**: the recorded resources, versioned by serial and lineage
//! - **StateBackend**: storage for the state file, with locking
//! - **LockInfo**: who holds the state lock, and until when
//!
//! # Example
//!
//! ```ignore
//! use agentstack_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local("agent.state.json")).await?;
//! let lock = backend.acquire_lock("record").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! state.record(stack.resources(), "aws");
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use state::{RecordSummary, ResourceState, StateFile};
