//! Discord interaction handlers
//!
//! This module turns gateway events (direct messages and button clicks) into
//! dispatcher events.

/// Direct message and button click routing
pub mod events;
