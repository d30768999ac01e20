//! taskmirror - client-side task sync and view engine
//!
//! Keeps a live local mirror of one user's tasks and categories from a
//! remote document store, projects them into filtered and sorted views, and
//! fires reminders as they fall due.
//!
//! # Core Concepts
//!
//! - **Mirror**: the local copy of a remote collection, replaced whole by
//!   every snapshot the subscription delivers
//! - **Write-through**: mutations go straight to the store and show up
//!   locally only once the subscription echoes them
//! - **Effective categories**: the fixed built-ins followed by the user's own
//! - **Reminders**: a periodic scan that notifies each task once, within the
//!   period after its reminder time
//!
//! # Module Organization
//!
//! - `remote`: document store interface plus in-memory and file-backed stores
//! - `mirror`: mirror state machine and the task/category mirrors
//! - `task`, `category`: records and write payloads
//! - `view`: the pure view projector
//! - `reminder`, `notification`: reminder scheduler and notification sinks
//! - `session`: wires mirrors and scheduler to one signed-in owner
//! - `backup`: JSON export and import
//! - `config`, `error`, `events`, `output`, `cli`: the command-line surface
//! - `storage`, `lock`: directory layout, atomic writes and file locks

pub mod backup;
pub mod category;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod mirror;
pub mod notification;
pub mod output;
pub mod reminder;
pub mod remote;
pub mod session;
pub mod storage;
pub mod task;
pub mod view;

pub use error::{Error, Result};
