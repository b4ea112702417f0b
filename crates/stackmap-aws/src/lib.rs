//! Inventory discovery for AWS accounts.
//!
//! Every resource kind is listed through the `aws` command-line tool and its
//! JSON output is mapped into `RawResource` records. The scanner gathers the
//! complete set before handing it to the core pipeline.

pub mod error;
pub mod parse;
pub mod runner;
pub mod scanner;

pub use error::AwsError;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
pub use scanner::{AwsScanner, ScanReport};
