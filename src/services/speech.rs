//! HTTP client for the speech services
//!
//! One client serves both directions: `POST {api_base}/asr` takes a multipart
//! audio upload and answers with a transcript, `POST {api_base}/tts` takes a
//! JSON request and streams the audio back. The stream is buffered completely
//! before it is handed to the caller.

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{ChatdeskError, Result};
use crate::services::{
    build_client, ensure_success, transport_error, AudioUpload, Envelope, SpeechAudio,
    SpeechRequest, SpeechToText, TextToSpeech, ASR_SERVICE, TTS_SERVICE,
};

#[derive(Debug, Deserialize)]
struct TranscriptData {
    #[serde(default)]
    text: Option<String>,
}

/// reqwest-backed speech-to-text and text-to-speech client
pub struct HttpSpeechService {
    client: Client,
    asr_url: String,
    tts_url: String,
    transcription_timeout: Duration,
    synthesis_timeout: Duration,
}

impl HttpSpeechService {
    /// Create a client from service configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = build_client()?;

        tracing::info!(
            "Initialized speech service client: asr={}, tts={}",
            config.asr_url(),
            config.tts_url()
        );

        Ok(Self {
            client,
            asr_url: config.asr_url(),
            tts_url: config.tts_url(),
            transcription_timeout: config.timeouts.transcription(),
            synthesis_timeout: config.timeouts.synthesis(),
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechService {
    async fn transcribe(&self, upload: &AudioUpload) -> Result<Option<String>> {
        tracing::debug!(
            filename = %upload.filename,
            mime_type = %upload.mime_type,
            bytes = upload.bytes.len(),
            "Uploading audio for transcription"
        );

        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.filename.clone())
            .mime_str(&upload.mime_type)
            .map_err(|e| {
                ChatdeskError::Validation(format!(
                    "invalid MIME type {}: {}",
                    upload.mime_type, e
                ))
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.asr_url)
            .multipart(form)
            .timeout(self.transcription_timeout)
            .send()
            .await
            .map_err(|e| transport_error(ASR_SERVICE, e))?;

        let response = ensure_success(ASR_SERVICE, response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(ASR_SERVICE, e))?;

        // `data` may be null when nothing was recognized.
        let envelope: Envelope<TranscriptData> =
            serde_json::from_str(&body).map_err(|e| ChatdeskError::Payload {
                service: ASR_SERVICE.to_string(),
                message: e.to_string(),
            })?;

        let text = envelope
            .data
            .and_then(|data| data.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        match &text {
            Some(t) => tracing::debug!("Transcribed {} characters", t.len()),
            None => tracing::info!("No speech recognized in {}", upload.filename),
        }
        Ok(text)
    }
}

#[async_trait]
impl TextToSpeech for HttpSpeechService {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<SpeechAudio> {
        tracing::debug!(
            voice = %request.voice,
            format = %request.format,
            chars = request.text.len(),
            "Requesting speech synthesis"
        );

        let response = self
            .client
            .post(&self.tts_url)
            .json(request)
            .timeout(self.synthesis_timeout)
            .send()
            .await
            .map_err(|e| transport_error(TTS_SERVICE, e))?;

        let response = ensure_success(TTS_SERVICE, response).await?;

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| transport_error(TTS_SERVICE, e))?;
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(ChatdeskError::Payload {
                service: TTS_SERVICE.to_string(),
                message: "audio stream was empty".to_string(),
            }
            .into());
        }

        tracing::debug!("Buffered {} bytes of audio", buffer.len());
        Ok(SpeechAudio {
            bytes: buffer.freeze(),
            format: request.format.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_service_creation() {
        let service = HttpSpeechService::new(&ServiceConfig::default()).unwrap();
        assert_eq!(service.asr_url, "http://localhost:8000/ai/asr");
        assert_eq!(service.tts_url, "http://localhost:8000/ai/tts");
        assert_eq!(service.synthesis_timeout, Duration::from_secs(60));
        assert_eq!(service.transcription_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_transcript_envelope_variants() {
        let envelope: Envelope<TranscriptData> = serde_json::from_str("{}").unwrap();
        assert!(envelope.data.is_none());

        let envelope: Envelope<TranscriptData> =
            serde_json::from_str(r#"{"data":{"text":"hello"}}"#).unwrap();
        assert_eq!(envelope.data.and_then(|d| d.text).as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_transcribe_rejects_invalid_mime_before_sending() {
        let service = HttpSpeechService::new(&ServiceConfig::default()).unwrap();
        let upload = AudioUpload::new(vec![1, 2, 3], "a.wav", "not a mime type");
        let err = service.transcribe(&upload).await.unwrap_err();
        assert!(err.to_string().contains("invalid MIME type"));
    }
}
