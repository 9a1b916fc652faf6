mod license;
mod modality;
mod model;
mod row;

pub use license::*;
pub use modality::*;
pub use model::*;
pub use row::*;
