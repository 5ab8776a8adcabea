pub mod activity;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod leads;
pub mod portfolio;
pub mod posts;
pub mod rbac;
pub mod settings;
pub mod track;
pub mod users;
