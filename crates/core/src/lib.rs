mod assets;
mod provider;

pub mod agent;
pub mod completion;
pub mod config;
pub mod model;
pub mod session;
pub mod tools;

#[cfg(test)]
mod test_utils;

pub use crate::assets::get_data_dir;
pub use crate::provider::llm::get_completion_llm;
pub use crate::provider::{OpenAIBaseModel, TestProviderModel};
