//! # Entity 模块
//!
//! 包含环站检查器读写的 Sea-ORM 实体定义

pub mod sites;
pub mod users;

pub use sites::Entity as Sites;
pub use users::Entity as Users;

#[cfg(test)]
mod tests;
