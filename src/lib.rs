pub mod logger;
pub mod settings;

pub mod application_impl;
pub mod application_port;
pub mod domain_model;
pub mod domain_port;
pub mod infra;

pub mod gateway;
pub mod guard;
pub mod session;
pub mod validation;

pub mod fake_backend;
