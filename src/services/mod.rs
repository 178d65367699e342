//! Background loading: the worker boundary, data sources and the paged
//! loading sequence.

pub mod channel;
pub mod data_source;
pub mod loader;
pub mod page_stream;
pub mod worker;
