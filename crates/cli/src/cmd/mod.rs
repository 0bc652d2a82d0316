pub mod card;
pub mod check_ignore;
pub mod common;
pub mod doctor;
pub mod index;
pub mod ls;
pub mod output;
pub mod search;
pub mod type_of;
