#![forbid(unsafe_code)]

pub mod error;

pub mod util {
    pub mod hash_reader;
}

pub mod domain;
pub mod extent;
pub mod locate;
pub mod integrity;
pub mod bundle;
pub mod naming;
pub mod schema;
pub mod metadata;
pub mod report;
pub mod validator;

// Re-exports: stable API surface
pub use extent::{ExtentResolver, ExtentTable};
pub use locate::{FileEnumerator, FlatDirEnumerator};
pub use naming::{ArdNaming, NamingConvention};
pub use report::{Report, Summary};
pub use schema::Schema;
pub use validator::{ValidateOptions, Validator, validate};
