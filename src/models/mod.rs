//! # Data Models
//!
//! Records of the persistence collaborator the transfer engine reads and writes.
//!
//! - [`TransferItem`] - one company→collection transfer attempt, owned by the engine
//! - [`CompanyCollectionAssociation`] - collection membership, consulted and inserted
//!   but owned by the surrounding application

pub mod core;

pub use self::core::company_collection_association::CompanyCollectionAssociation;
pub use self::core::transfer_item::{NewTransferItem, TransferItem};
