//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the persisted users, payment submissions and bonus codes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod code;
pub mod payment;
pub mod user;

/// Messaging-platform user identifier, used as the users table primary key.
pub type UserId = i64;

// Re-export specific types to avoid conflicts
pub use code::{Column as CodeColumn, Entity as Code, Model as CodeModel};
pub use payment::{
    Column as PaymentColumn, Entity as Payment, Model as PaymentModel, PaymentStatus,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
