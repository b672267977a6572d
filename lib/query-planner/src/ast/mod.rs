pub mod arguments;
pub mod normalization;
pub mod operation;
pub mod selection_item;
pub mod selection_path;
pub mod selection_set;
pub mod type_ref;
pub mod value;
