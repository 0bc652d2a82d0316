//! Card references, instance documents and recorded errors.

mod card_ref;
mod document;
mod error;

pub use card_ref::{CardRef, CodeRef, internal_key_for, is_card_ref};
pub use document::{
    CardCollectionDocument, CardMeta, CardResource, Links, Relationship, ResourceIdentifier,
    ResourceType, SingleCardDocument, is_card_resource, is_single_card_document,
};
pub use error::SerializedError;
