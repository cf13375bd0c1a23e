pub mod quota;
pub mod summaries;
