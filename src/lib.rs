#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod types;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
