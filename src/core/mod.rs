// Session workflow and shared errors/models
pub mod workstation {
    pub use crate::workstation::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
