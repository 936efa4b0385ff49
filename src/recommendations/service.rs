use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::{db::models::DailySummary, llm::TextGenerator, readings::ReadingService};

/// Instruction sent as the system turn of every recommendation request.
pub const SYSTEM_INSTRUCTION: &str = "Analyze the following data from an IoT health wristband \
and provide health recommendations based on the metrics of heart rate, body temperature, and \
physical activity: Offers health advice and proactive alerts based on these data inputs, \
communicating in a positive and supportive manner. Provide actionable recommendations to \
enhance their health based on the analysis of their physical activity, temperature, and heart \
rate. Also recommend workout routines.";

#[derive(Debug, Error)]
pub enum RecommendationError {
    /// Today's summary lacks one of the figures the prompt needs.
    #[error("no {0} recorded today")]
    InsufficientData(&'static str),

    #[error("failed to compute today's summary")]
    Storage(#[source] anyhow::Error),

    #[error("text generation failed")]
    Upstream(#[source] anyhow::Error),
}

/// Figures for the prompt, all present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptInputs {
    pub avg_heartrate: f64,
    pub avg_bodytemp: f64,
    pub total_steps: i64,
}

impl TryFrom<DailySummary> for PromptInputs {
    type Error = RecommendationError;

    fn try_from(s: DailySummary) -> Result<Self, Self::Error> {
        Ok(Self {
            avg_heartrate: s
                .avg_heartrate
                .ok_or(RecommendationError::InsufficientData("heart rate"))?,
            avg_bodytemp: s
                .avg_bodytemp
                .ok_or(RecommendationError::InsufficientData("body temperature"))?,
            total_steps: s
                .total_steps
                .ok_or(RecommendationError::InsufficientData("steps"))?,
        })
    }
}

/// User turn embedding today's figures.
pub fn build_prompt(inputs: &PromptInputs) -> String {
    format!(
        "Average heart rate today is {:.2} BPM, average body temperature today is {:.2} °C, \
         and total steps taken today are {}.",
        inputs.avg_heartrate, inputs.avg_bodytemp, inputs.total_steps
    )
}

/// Turns today's summary into advice from the text generator.
///
/// Nothing is cached: every call recomputes the summary and calls upstream.
#[derive(Clone)]
pub struct RecommendationService {
    readings: ReadingService,
    generator: Arc<dyn TextGenerator>,
}

impl RecommendationService {
    pub fn new(readings: ReadingService, generator: Arc<dyn TextGenerator>) -> Self {
        Self { readings, generator }
    }

    pub async fn recommend(&self, now: DateTime<Utc>) -> Result<String, RecommendationError> {
        let summary = self
            .readings
            .daily_summary(now)
            .await
            .map_err(RecommendationError::Storage)?;
        let inputs = PromptInputs::try_from(summary)?;
        let prompt = build_prompt(&inputs);

        info!(
            avg_heartrate = inputs.avg_heartrate,
            avg_bodytemp = inputs.avg_bodytemp,
            total_steps = inputs.total_steps,
            "Requesting recommendation"
        );

        self.generator
            .generate(SYSTEM_INSTRUCTION, &prompt)
            .await
            .map_err(RecommendationError::Upstream)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::{
        config::CalendarPolicy,
        db::{models::NewSensorReading, InMemoryReadingStore},
    };

    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        async fn generate(&self, system: &str, prompt: &str) -> anyhow::Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_owned(), prompt.to_owned()));
            if self.fail {
                Err(anyhow!("upstream unavailable"))
            } else {
                Ok("Take a brisk walk.".to_owned())
            }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 18, 0, 0).unwrap()
    }

    fn reading(h: u32, heartrate: Option<f64>, bodytemp: Option<f64>, steps: Option<i64>) -> NewSensorReading {
        NewSensorReading {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 3, h, 0, 0).unwrap(),
            device_id: "wristband-1".into(),
            sensor_type: "combined".into(),
            user_id: "user-1".into(),
            additional_info: None,
            accel_x: None,
            accel_y: None,
            accel_z: None,
            steps,
            heartrate,
            spo2: None,
            bodytemp,
        }
    }

    async fn setup(
        readings: Vec<NewSensorReading>,
        generator: Arc<RecordingGenerator>,
    ) -> RecommendationService {
        let svc = ReadingService::new(Arc::new(InMemoryReadingStore::new()), CalendarPolicy::default());
        for r in readings {
            svc.ingest(r).await.unwrap();
        }
        RecommendationService::new(svc, generator)
    }

    #[test]
    fn prompt_formats_two_decimals() {
        let prompt = build_prompt(&PromptInputs {
            avg_heartrate: 70.0,
            avg_bodytemp: 36.5,
            total_steps: 5000,
        });
        assert_eq!(
            prompt,
            "Average heart rate today is 70.00 BPM, average body temperature today is 36.50 °C, \
             and total steps taken today are 5000."
        );
    }

    #[test]
    fn missing_value_is_insufficient_data() {
        let err = PromptInputs::try_from(DailySummary {
            avg_heartrate: Some(70.0),
            avg_bodytemp: None,
            total_steps: Some(10),
        })
        .unwrap_err();
        assert!(matches!(err, RecommendationError::InsufficientData("body temperature")));
    }

    #[tokio::test]
    async fn recommend_sends_summary_and_returns_reply() {
        let generator = Arc::new(RecordingGenerator::default());
        let svc = setup(
            vec![
                reading(9, Some(60.0), Some(36.0), Some(2000)),
                reading(15, Some(80.0), Some(37.0), Some(3000)),
            ],
            generator.clone(),
        )
        .await;

        let text = svc.recommend(now()).await.unwrap();
        assert_eq!(text, "Take a brisk walk.");

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SYSTEM_INSTRUCTION);
        assert!(calls[0].1.contains("70.00"));
        assert!(calls[0].1.contains("36.50"));
        assert!(calls[0].1.contains("5000"));
    }

    #[tokio::test]
    async fn recommend_without_readings_skips_upstream() {
        let generator = Arc::new(RecordingGenerator::default());
        let svc = setup(vec![], generator.clone()).await;

        let err = svc.recommend(now()).await.unwrap_err();
        assert!(matches!(err, RecommendationError::InsufficientData("heart rate")));
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recommend_without_steps_is_insufficient() {
        let generator = Arc::new(RecordingGenerator::default());
        let svc = setup(vec![reading(9, Some(60.0), Some(36.0), None)], generator.clone()).await;

        let err = svc.recommend(now()).await.unwrap_err();
        assert!(matches!(err, RecommendationError::InsufficientData("steps")));
    }

    #[tokio::test]
    async fn upstream_failure_is_reported() {
        let generator = Arc::new(RecordingGenerator {
            fail: true,
            ..Default::default()
        });
        let svc = setup(vec![reading(9, Some(60.0), Some(36.0), Some(1))], generator).await;

        let err = svc.recommend(now()).await.unwrap_err();
        assert!(matches!(err, RecommendationError::Upstream(_)));
    }
}
