//! Persistent side stores of the indexer: content-derived ids, the
//! offset-addressed blob arena and the flat header file.

pub mod blobs;
pub mod headers;
pub mod ids;
pub mod remote;
