pub(crate) mod llm;
mod openai;
mod openai_types;
mod test_provider;

pub use openai::OpenAIBaseModel;
pub use test_provider::TestProviderModel;
