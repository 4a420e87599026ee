#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use crate::errors::{Error, Result};

pub mod batch;
pub mod errors;
pub mod external;
pub mod inputs;
pub mod logging;
pub mod output;
pub mod scratch;
pub mod unrar;
