//! Shared domain types, validation, and configuration.

pub mod address;
pub mod config;
pub mod group;
pub mod validator;

pub use address::{AddressType, EmailAddress};
pub use config::Config;
pub use group::{EmailAddressGroup, GroupStatus, Region};
pub use validator::is_valid_email;
