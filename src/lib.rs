pub mod config;
pub mod error;
pub mod report;
pub mod compute_family;

pub mod data {
    pub mod event;
    pub mod columnar;
    pub mod loader;
    pub mod splitter;
    pub mod prep;
    pub mod sqlite;
}

pub mod metrics {
    pub mod performance;
    pub mod roc;
}

pub use error::{Error, Result};
