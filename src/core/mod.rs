// Pure verification logic and shared models
pub mod extraction {
    pub use crate::extraction::*;
}

pub mod slot_validation {
    pub use crate::slot_validation::*;
}

pub mod deepfake {
    pub use crate::deepfake::*;
}

pub mod decision {
    pub use crate::decision::*;
}

pub mod verification {
    pub use crate::verification::*;
}

pub mod models {
    pub use crate::models::*;
}
