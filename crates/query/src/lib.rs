pub mod global_search;
pub mod local_search;
pub mod prompts;
pub mod references;

pub use global_search::{
    GlobalSearch, GlobalSearchConfig, GlobalSearchResult, GlobalSearchTrace, KeyPoint, MapOutcome,
    NO_DATA_ANSWER,
};
pub use local_search::{keyword_terms, LocalSearch, LocalSearchConfig, LocalSearchResult, SearchTrace};
pub use references::collapse_data_references;
