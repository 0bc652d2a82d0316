//! Card type resolution.
//!
//! Builds [`CardDefinition`]s from analyzed modules, following each card's
//! super chain and field declarations across modules and, through a
//! [`crate::loader::Loader`], across realms.

mod base;
mod definition;
mod errors;
mod external;
mod resolver;

pub use base::{
    BASE_REALM, BASE_REALM_URL, CARD_API_MODULE, Primitive, base_definitions, format_query_value,
    is_card_api_export, root_card_ref,
};
pub use definition::{CardDefinition, Definitions, FieldDefinition, FieldType};
pub use errors::DefinitionError;
pub use external::{RemoteTypes, TypeCache, type_of_url};
pub use resolver::{DefinitionBuild, DefinitionResolver};
