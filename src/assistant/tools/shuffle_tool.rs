use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::registry::{Tool, ToolError};

/// Number of titles returned when the model does not ask for a count.
const DEFAULT_PICKS: usize = 5;

/// Arguments for the shuffle tool
#[derive(Deserialize)]
pub struct ShufflePicksArgs {
    /// Candidate titles to sample from
    pub titles: Vec<String>,
    /// How many titles to return (default: 5)
    #[serde(default)]
    pub count: Option<usize>,
}

/// Uniform random sampler over a list of titles.
///
/// Backs the "shuffle and deal me" starter: the model supplies the candidate
/// list and gets back an unbiased pick, since language models are poor sources
/// of randomness.
pub struct ShufflePicksTool;

#[async_trait]
impl Tool for ShufflePicksTool {
    fn name(&self) -> &str {
        "shuffle_picks"
    }

    async fn invoke(&self, args: Value) -> Result<String, ToolError> {
        let args: ShufflePicksArgs =
            serde_json::from_value(args).map_err(|err| ToolError::InvalidArguments {
                name: self.name().to_string(),
                reason: err.to_string(),
            })?;

        if args.titles.is_empty() {
            return Err(ToolError::InvalidArguments {
                name: self.name().to_string(),
                reason: "'titles' must not be empty".to_string(),
            });
        }

        let count = args.count.unwrap_or(DEFAULT_PICKS).min(args.titles.len());
        info!(candidates = args.titles.len(), count, "shuffling picks");

        let mut titles = args.titles;
        titles.shuffle(&mut rand::thread_rng());
        titles.truncate(count);
        Ok(titles.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returns_requested_number_of_picks() {
        let args = json!({ "titles": ["a", "b", "c", "d"], "count": 2 });
        let output = ShufflePicksTool.invoke(args).await.unwrap();
        assert_eq!(output.split(", ").count(), 2);
    }

    #[tokio::test]
    async fn picks_are_a_subset_of_the_candidates() {
        let args = json!({ "titles": ["a", "b", "c"] });
        let output = ShufflePicksTool.invoke(args).await.unwrap();
        for pick in output.split(", ") {
            assert!(["a", "b", "c"].contains(&pick));
        }
    }

    #[tokio::test]
    async fn count_is_clamped_to_available_titles() {
        let args = json!({ "titles": ["only"], "count": 10 });
        let output = ShufflePicksTool.invoke(args).await.unwrap();
        assert_eq!(output, "only");
    }

    #[tokio::test]
    async fn empty_title_list_is_rejected() {
        let err = ShufflePicksTool
            .invoke(json!({ "titles": [] }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
