//! Storage and notification collaborators.

pub mod storage {
    pub use crate::db_storage::*;
}

pub mod notify {
    pub use crate::notify::*;
}
