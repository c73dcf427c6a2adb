//! Database models split into domain-specific modules.

pub mod cart;
pub mod common;
pub mod category;
pub mod expense;
pub mod order;
pub mod product;
pub mod site_setting;
pub mod staff;
pub mod user;

pub use cart::*;
pub use common::*;
pub use category::*;
pub use expense::*;
pub use order::*;
pub use product::*;
pub use site_setting::*;
pub use staff::*;
pub use user::*;
