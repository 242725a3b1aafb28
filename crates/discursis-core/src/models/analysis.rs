use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recurrence model to compute and how many terms it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuery {
    /// Model type, e.g. `term`, `term-expansion`, `composition`
    pub model: String,
    /// Restrict the model to the most frequent terms; `None` or 0 means all
    pub num_terms: Option<u32>,
}

impl ModelQuery {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            num_terms: None,
        }
    }

    pub fn with_num_terms(mut self, num_terms: Option<u32>) -> Self {
        self.num_terms = num_terms;
        self
    }

    /// Query parameters; `num_terms` only when set and non-zero
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("model", self.model.clone())];
        if let Some(n) = self.num_terms.filter(|n| *n > 0) {
            params.push(("num_terms", n.to_string()));
        }
        params
    }
}

/// Server-generated CSV exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    ChannelSimilarity,
    Primitives,
}

impl ExportKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ExportKind::ChannelSimilarity => "channel-similarity",
            ExportKind::Primitives => "primitives",
        }
    }
}

/// Utterances plus the utterance-by-utterance recurrence matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceModel {
    #[serde(default)]
    pub utterances: Vec<serde_json::Value>,
    #[serde(default)]
    pub recurrence_matrix: Vec<Vec<f64>>,
}

/// Clusters keyed by their lead term
pub type TermClusters = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarTerms {
    #[serde(default)]
    pub clusters: TermClusters,
    #[serde(default)]
    pub ignored_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutTerm {
    pub name: String,
    pub position: Vec<f64>,
    pub frequency: f64,
}

/// 2D projection of the project's terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermLayout {
    #[serde(default)]
    pub terms: Vec<LayoutTerm>,
    #[serde(default)]
    pub clusters: TermClusters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_query_params() {
        assert_eq!(
            ModelQuery::new("term").params(),
            vec![("model", "term".to_string())]
        );
        assert_eq!(
            ModelQuery::new("composition").with_num_terms(Some(50)).params(),
            vec![("model", "composition".to_string()), ("num_terms", "50".to_string())]
        );
        // Zero means "all terms" and is not sent
        assert_eq!(ModelQuery::new("term").with_num_terms(Some(0)).params().len(), 1);
    }

    #[test]
    fn test_parse_term_layout() {
        let json = r#"{
            "terms": [
                {"name": "economy", "position": [0.5, -1.25], "frequency": 12},
                {"name": "jobs", "position": [0.6, -1.2], "frequency": 4}
            ],
            "clusters": {"economy": ["economy", "jobs"]}
        }"#;
        let layout: TermLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.terms.len(), 2);
        assert_eq!(layout.terms[0].position, vec![0.5, -1.25]);
        assert_eq!(layout.terms[1].frequency, 4.0);
        assert_eq!(layout.clusters["economy"], vec!["economy", "jobs"]);
    }

    #[test]
    fn test_parse_similar_terms_and_recurrence() {
        let similar: SimilarTerms =
            serde_json::from_str(r#"{"clusters": {}, "ignored_terms": ["uh", "um"]}"#).unwrap();
        assert!(similar.clusters.is_empty());
        assert_eq!(similar.ignored_terms, vec!["uh", "um"]);

        let model: RecurrenceModel = serde_json::from_str(
            r#"{"utterances": [{"speaker": "A", "text": "hi"}], "recurrence_matrix": [[1.0]]}"#,
        )
        .unwrap();
        assert_eq!(model.utterances.len(), 1);
        assert_eq!(model.recurrence_matrix, vec![vec![1.0]]);
    }
}
