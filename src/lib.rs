pub mod logging;
pub mod settings;
pub mod http;
pub mod checklist;
pub mod papers;
pub mod ai_client;
pub mod analysis;
pub mod report;
pub mod batch;
pub mod crossref;
pub mod scholar;
pub mod harvest;
pub mod utils;

#[cfg(test)]
mod test_support;
