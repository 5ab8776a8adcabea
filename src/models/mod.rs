pub mod content;
pub mod lead;
pub mod rbac;
pub mod settings;
pub mod user;
pub mod visitor;
