use async_trait::async_trait;

use super::ApiError;
use crate::models::{ChartsResponse, StatsResponse};

/// Source of the headline totals.
#[async_trait]
pub trait StatsEndpoint: Send + Sync {
    async fn fetch_stats(&self) -> Result<StatsResponse, ApiError>;
}

/// Source of the raw chart series.
#[async_trait]
pub trait ChartsEndpoint: Send + Sync {
    async fn fetch_charts(&self) -> Result<ChartsResponse, ApiError>;
}
