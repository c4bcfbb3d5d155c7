//! Data models used throughout the client
//!
//! This module contains the JSON-RPC envelopes and the transaction shapes
//! exchanged with the node.

// JSON-RPC protocol data structures
pub mod jsonrpc;

// Transaction fields, wire form and receipts
pub mod transaction;
