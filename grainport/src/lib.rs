//! # Grainport
//!
//! Orleans-style virtual actors for plain Rust types.
//!
//! Actor implementations are ordinary types implementing
//! [`Actor`](actor::Actor). At startup, the libraries that contain them are
//! scanned, an endpoint program declaring one interface and one adapter per
//! actor kind is synthesized, and the embedded endpoint compiler turns it into
//! an [`EndpointModule`](declaration::EndpointModule). Every actor kind is then
//! bound to its generated adapter in the [`ActorTypeRegistry`](registry::ActorTypeRegistry).
//! At runtime, the host creates one [`ActorEndpoint`](endpoint::ActorEndpoint)
//! per activation; the endpoint turns host callbacks into messages for the
//! actor.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  ActorSystem (system)                                         │
//! │   builder ─► libraries ─► bootstrappers ─► ActorRef           │
//! ├──────────────────────────────┬────────────────────────────────┤
//! │  declaration                 │  hosting                       │
//! │  • ActorTypeCode             │  • LocalHost                   │
//! │  • synthesize()              │  • activation table            │
//! │  • EndpointCompiler          │  • turn gate, timers           │
//! │                              │  • ReminderService             │
//! ├──────────────────────────────┼────────────────────────────────┤
//! │  registry                    │  endpoint                      │
//! │  • ActorType                 │  • ActorEndpoint               │
//! │  • ActorTypeRegistry         │  • ActivationRuntime           │
//! ├──────────────────────────────┴────────────────────────────────┤
//! │  actor: Actor, ActorContext, ActorLifecycle, Message          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use grainport::prelude::*;
//!
//! let system = ActorSystem::builder()
//!     .library(ActorLibrary::new("bank").actor::<Account>())
//!     .done()
//!     .await?;
//!
//! let account = system.actor_of::<Account>("alice")?;
//! let balance: i64 = account.ask(&json!({ "deposit": 100 })).await?;
//! ```
//!
//! Everything is single-threaded and must run inside a tokio `LocalSet`.

#![warn(missing_docs)]

pub mod actor;
pub mod config;
pub mod declaration;
pub mod endpoint;
pub mod error;
pub mod hosting;
pub mod prelude;
pub mod registry;
pub mod system;
