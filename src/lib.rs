//! Neighborly Notify - notification polling for the Neighborly assistance board.
//!
//! # Overview
//!
//! The Neighborly board lets neighbors post help requests, volunteer for
//! them, and review each other. This crate implements the client-side
//! notification coordinator for it: a polling loop that keeps a
//! near-real-time view of the signed-in user's unread notifications while
//! avoiding duplicate toast presentations and runaway retries against a
//! failing backend.
//!
//! # Behavior
//!
//! - Polls `GET /notifications/` on a fixed interval while the app is
//!   foregrounded; backgrounded ticks skip their network call.
//! - Surfaces at most one toast per notification id per session, and never
//!   for notifications older than a recency window.
//! - Stops itself after repeated consecutive fetch failures; an explicit
//!   refresh, a foreground transition, or a re-login resumes it.
//! - Clears every state field on logout.
//!
//! # Modules
//!
//! - [`model`]: Wire types for the board's notifications API
//! - [`client`]: HTTP client and the injectable [`client::NotificationSource`] seam
//! - [`session`]: Signed-in-user capability the coordinator follows
//! - [`lifecycle`]: Foreground/background capability the coordinator follows
//! - [`poller`]: The polling coordinator itself

pub mod client;
pub mod lifecycle;
pub mod model;
pub mod poller;
pub mod session;
