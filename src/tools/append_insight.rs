//! AppendInsight tool

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::GatewayError;
use crate::insights::{InsightsMemo, MEMO_URI};
use crate::tools::Tool;
use crate::tools::helpers::{ToolOutput, require_argument};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AppendInsightArgs {
    /// Data insight discovered from analysis
    pub insight: String,
}

#[derive(Clone)]
pub struct AppendInsightTool {
    memo: Arc<InsightsMemo>,
}

impl AppendInsightTool {
    pub fn new(memo: Arc<InsightsMemo>) -> Self {
        Self { memo }
    }
}

#[async_trait]
impl Tool for AppendInsightTool {
    type Args = AppendInsightArgs;

    fn name() -> &'static str {
        "append_insight"
    }

    fn description() -> &'static str {
        "Add a data insight to the memo"
    }

    fn required_arguments() -> &'static [&'static str] {
        &["insight"]
    }

    async fn execute(&self, args: Self::Args) -> Result<ToolOutput, GatewayError> {
        let insight = require_argument(&args.insight, || {
            GatewayError::missing_argument("insight")
        })?;

        self.memo.add_insight(insight);
        log::debug!("Memo now holds {} insights", self.memo.len());

        Ok(ToolOutput::text("Insight added to memo").notify(MEMO_URI))
    }
}
