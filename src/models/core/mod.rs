pub mod company_collection_association;
pub mod transfer_item;
