//! Insight memo accumulated during a session

use std::sync::RwLock;

/// URI the memo is served under
pub const MEMO_URI: &str = "memo://insights";

/// Append-only list of insights recorded by the agent
#[derive(Debug, Default)]
pub struct InsightsMemo {
    insights: RwLock<Vec<String>>,
}

impl InsightsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_insight(&self, insight: impl Into<String>) {
        let mut insights = self
            .insights
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        insights.push(insight.into());
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<String>> {
        self.insights
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Render the memo as served at [`MEMO_URI`]
    ///
    /// ```
    /// # use warehouse_gateway::insights::InsightsMemo;
    /// let memo = InsightsMemo::new();
    /// assert_eq!(memo.get_memo(), "No data insights have been discovered yet.");
    ///
    /// memo.add_insight("Revenue peaks on Mondays");
    /// assert!(memo.get_memo().contains("- Revenue peaks on Mondays"));
    /// ```
    pub fn get_memo(&self) -> String {
        let insights = self.read();
        if insights.is_empty() {
            return "No data insights have been discovered yet.".to_string();
        }

        let mut memo = String::from("📊 Data Intelligence Memo 📊\n\n");
        memo.push_str("Key Insights Discovered:\n\n");
        let lines: Vec<String> = insights.iter().map(|i| format!("- {}", i)).collect();
        memo.push_str(&lines.join("\n"));

        if insights.len() > 1 {
            memo.push_str("\n\nSummary:\n");
            memo.push_str(&format!(
                "Analysis has revealed {} key data insights that suggest opportunities \
                 for strategic optimization and growth.",
                insights.len()
            ));
        }

        memo
    }
}
