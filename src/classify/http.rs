//! `HttpClassifier` — zero-shot scoring through an inference service.
//!
//! The model runs out of process (it needs a GPU-sized runtime the capture
//! device does not carry).  Each window is POSTed as JSON:
//!
//! ```json
//! { "model": "laion/larger_clap_general", "sample_rate": 48000,
//!   "candidate_labels": ["traffic", "birds"], "samples": [0.0, 0.01] }
//! ```
//!
//! and the service answers with either a ranked list
//! `[{"label": "traffic", "score": 0.9}, …]` or the parallel-array form
//! `{"labels": [...], "scores": [...]}`.  All connection details come from
//! [`ClassifierConfig`].

use std::time::Duration;

use serde::Deserialize;

use crate::audio::resample;
use crate::classify::scorer::{Classifier, ClassificationError, LabelScore};
use crate::config::ClassifierConfig;

/// Response shapes accepted from the service.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Ranked(Vec<LabelScore>),
    Parallel { labels: Vec<String>, scores: Vec<f32> },
}

/// Decode a service response body into label scores.
pub(crate) fn parse_scores(body: &str) -> Result<Vec<LabelScore>, ClassificationError> {
    let response: ScoreResponse =
        serde_json::from_str(body).map_err(|e| ClassificationError::Parse(e.to_string()))?;

    let scores = match response {
        ScoreResponse::Ranked(scores) => scores,
        ScoreResponse::Parallel { labels, scores } => {
            if labels.len() != scores.len() {
                return Err(ClassificationError::Parse(format!(
                    "{} labels but {} scores",
                    labels.len(),
                    scores.len()
                )));
            }
            labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| LabelScore { label, score })
                .collect()
        }
    };

    if scores.is_empty() {
        return Err(ClassificationError::EmptyResult);
    }
    Ok(scores)
}

// ---------------------------------------------------------------------------
// HttpClassifier
// ---------------------------------------------------------------------------

/// Calls a zero-shot audio classification service over HTTP.
pub struct HttpClassifier {
    client: reqwest::blocking::Client,
    config: ClassifierConfig,
}

impl HttpClassifier {
    /// Build an `HttpClassifier` from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassificationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassificationError::WarmUp(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

impl Classifier for HttpClassifier {
    /// Check `health_url` once, when configured.
    fn warm_up(&mut self) -> Result<(), ClassificationError> {
        let Some(url) = self.config.health_url.as_deref() else {
            return Ok(());
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ClassificationError::WarmUp(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassificationError::WarmUp(format!(
                "{url} answered HTTP {}",
                response.status().as_u16()
            )));
        }

        log::info!("classifier service ready ({})", self.config.model);
        Ok(())
    }

    fn classify(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        candidate_labels: &[String],
    ) -> Result<Vec<LabelScore>, ClassificationError> {
        let audio = resample(samples, sample_rate, self.config.sample_rate);

        let body = serde_json::json!({
            "model":            self.config.model,
            "sample_rate":      self.config.sample_rate,
            "candidate_labels": candidate_labels,
            "samples":          audio,
        });

        let response = self.client.post(&self.config.endpoint).json(&body).send()?;

        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        parse_scores(&text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranked_list() {
        let body = r#"[{"label":"traffic","score":0.9},{"label":"birds","score":0.05}]"#;
        let scores = parse_scores(body).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0], LabelScore::new("traffic", 0.9));
    }

    #[test]
    fn parses_parallel_arrays() {
        let body = r#"{"labels":["wind","rain"],"scores":[0.6,0.4]}"#;
        let scores = parse_scores(body).unwrap();
        assert_eq!(scores[1], LabelScore::new("rain", 0.4));
    }

    #[test]
    fn mismatched_arrays_rejected() {
        let body = r#"{"labels":["wind","rain"],"scores":[0.6]}"#;
        assert!(matches!(
            parse_scores(body),
            Err(ClassificationError::Parse(_))
        ));
    }

    #[test]
    fn empty_list_is_an_error() {
        assert!(matches!(
            parse_scores("[]"),
            Err(ClassificationError::EmptyResult)
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_scores("<html>502</html>"),
            Err(ClassificationError::Parse(_))
        ));
    }

    #[test]
    fn from_config_builds() {
        let classifier = HttpClassifier::from_config(&ClassifierConfig::default()).unwrap();
        let _boxed: Box<dyn Classifier> = Box::new(classifier);
    }

    #[test]
    fn warm_up_without_health_url_is_ok() {
        let mut classifier = HttpClassifier::from_config(&ClassifierConfig::default()).unwrap();
        assert!(classifier.warm_up().is_ok());
    }
}
