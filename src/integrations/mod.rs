//! Model backends and batch file formats.

pub mod oracle {
    pub use crate::oracle::*;
}

pub mod oracle_client {
    pub use crate::oracle_client::*;
}

pub mod files {
    pub use crate::decode::*;
    pub use crate::export::*;
}
