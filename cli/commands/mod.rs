pub mod classify;
pub mod cleanup;
pub mod filetypes;
pub mod reverse;
pub mod scan;
