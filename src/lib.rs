pub mod archive;
pub mod checksum;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod download;
pub mod error;
pub mod github;
pub mod http;
pub mod install;
pub mod manifest;
pub mod platform;
pub mod resolver;
pub mod runtime;
pub mod selftest;
