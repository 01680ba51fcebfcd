pub mod process;
pub mod record;
pub mod run;

pub use process::*;
pub use record::*;
pub use run::*;
