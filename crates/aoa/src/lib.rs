//! AOA ("Automated Opportunity Allocation") integration: the ranking
//! service HTTP client and the cohort-based allocation interactor.

mod allocation;
mod client;

pub use allocation::{in_treatment_group, AoaData, AoaResponseData, BuildAoaData, Cohort};
pub use client::{
    parse_rank_response, AoaClient, AoaRankResult, AoaRankingApi, ConsultantMatrix,
    REQUEST_ID_HEADER,
};
