//! Remote API surface consumed by the configuration layer

use crate::bugreport::DynamicReportModel;
use crate::response::AppConfigResponse;
use async_trait::async_trait;
use skyhop_common::ApiResult;

/// Black-box API client for configuration endpoints
#[async_trait]
pub trait AppConfigApi: Send + Sync {
    async fn get_app_config(&self) -> ApiResult<AppConfigResponse>;
    async fn get_bug_report_config(&self) -> ApiResult<DynamicReportModel>;
}
