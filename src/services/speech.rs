//! Speech services: transcription and synthesis
//!
//! Wraps the OpenAI audio endpoints behind `TranscriptionService` (Whisper
//! speech-to-text with a language hint) and `SpeechService` (TTS with a
//! personality voice and a per-user speed multiplier).

use crate::error::{CoachError, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request timeout duration; audio uploads can be slow
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Speech-to-text service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe an audio blob, hinting the expected language
    async fn transcribe(&self, audio: Vec<u8>, filename: String, language: &str) -> Result<String>;
}

/// Text-to-speech service trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Synthesize speech, returning an mp3 byte stream
    async fn synthesize(&self, text: &str, voice: &str, speed: f64) -> Result<Vec<u8>>;
}

/// OpenAI-backed speech client implementing both directions
pub struct OpenAiSpeech {
    client: Client,
    api_key: String,
    transcription_model: String,
    tts_model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    speed: f64,
    response_format: &'a str,
}

impl OpenAiSpeech {
    /// Create a new speech client
    pub fn new(api_key: String, transcription_model: String, tts_model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(CoachError::Config(config::ConfigError::Message(
                "OpenAI API key not set".to_string(),
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            transcription_model,
            tts_model,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }
}

#[async_trait]
impl TranscriptionService for OpenAiSpeech {
    async fn transcribe(&self, audio: Vec<u8>, filename: String, language: &str) -> Result<String> {
        if audio.is_empty() {
            return Err(CoachError::InvalidInput("No audio provided".to_string()));
        }

        debug!(
            "Transcribing {} bytes of audio (language hint: {})",
            audio.len(),
            language
        );

        let part = multipart::Part::bytes(audio)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| CoachError::Speech(format!("Invalid audio part: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .text("language", language.to_string())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(CoachError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CoachError::Speech(format!(
                "Transcription failed with status {}: {}",
                status, error_text
            )));
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CoachError::Speech(format!("Failed to parse response: {}", e)))?;

        Ok(transcription.text)
    }
}

#[async_trait]
impl SpeechService for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &str, speed: f64) -> Result<Vec<u8>> {
        if text.is_empty() {
            return Err(CoachError::InvalidInput("No text provided".to_string()));
        }

        debug!(
            "Synthesizing {} chars (voice: {}, speed: {})",
            text.len(),
            voice,
            speed
        );

        let request = SpeechRequest {
            model: &self.tts_model,
            voice,
            input: text,
            speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(CoachError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CoachError::Speech(format!(
                "Speech synthesis failed with status {}: {}",
                status, error_text
            )));
        }

        let bytes = response.bytes().await.map_err(CoachError::Http)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenAiSpeech::new(String::new(), "whisper-1".to_string(), "tts-1".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn test_speech_request_serialization() {
        let request = SpeechRequest {
            model: "tts-1",
            voice: "nova",
            input: "Ciao, come stai?",
            speed: 0.85,
            response_format: "mp3",
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["voice"], "nova");
        assert_eq!(json["speed"], 0.85);
        assert_eq!(json["response_format"], "mp3");
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let service =
            OpenAiSpeech::new("test-key".to_string(), "whisper-1".to_string(), "tts-1".to_string())
                .unwrap();

        let result = service.transcribe(Vec::new(), "audio.webm".to_string(), "it").await;
        assert!(matches!(result, Err(CoachError::InvalidInput(_))));

        let result = service.synthesize("", "nova", 0.85).await;
        assert!(matches!(result, Err(CoachError::InvalidInput(_))));
    }
}
