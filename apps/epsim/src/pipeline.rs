//! # Audio Pipeline
//!
//! Turns a stored recording into a `RecordingAnalysis`:
//!
//! 1. Resolve the recording path inside the audio directory
//! 2. Decode WAV with `hound` and measure it with `AudioMetrics`
//! 3. Transcribe through the configured backend (optional)
//! 4. Compare the transcript with the expected text
//!
//! Decode and transcription failures end up in the analysis as a
//! processing error. Only path problems are returned as errors.

use crate::config::{AudioConfig, Provider, TranscriptionConfig};
use epsim_core::{
    AssessmentId, AudioFormat, AudioMetrics, AudioRecording, EpsimError, RecordingAnalysis,
    Registry, UserId,
};
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_AGENT: &str = concat!("epsim/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// TRANSCRIPTION
// =============================================================================

/// Client for an OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone)]
pub struct WhisperClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, EpsimError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| EpsimError::IoError(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Upload `bytes` and return the transcript text.
    pub async fn transcribe(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        format: AudioFormat,
        language: &str,
    ) -> Result<String, String> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(format.mime_type())
            .map_err(|e| format!("Transcription request: {}", e))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .part("file", part);

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("Transcription failed: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Transcription failed: HTTP {} {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }
        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| format!("Transcription response: {}", e))?;
        Ok(parsed.text.trim().to_string())
    }
}

/// Configured speech-to-text backend.
#[derive(Debug, Clone)]
pub enum Transcriber {
    Disabled,
    Whisper(WhisperClient),
}

impl Transcriber {
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, EpsimError> {
        match config.provider {
            Provider::Disabled => Ok(Self::Disabled),
            Provider::Whisper => Ok(Self::Whisper(WhisperClient::new(config)?)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

// =============================================================================
// ANALYSIS JOB
// =============================================================================

/// A recording copied out of the registry, ready to analyze without
/// holding any lock.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub recording: AudioRecording,
    /// Reference text for the pronunciation heuristic.
    pub expected: Option<String>,
}

impl AnalysisJob {
    /// Check that `actor` may analyze the recording and collect it.
    /// Runs before any file or network access.
    ///
    /// Without `expected_text` the linked question's text is used.
    pub fn prepare(
        registry: &Registry,
        actor: UserId,
        id: AssessmentId,
        index: usize,
        expected_text: Option<String>,
        apply_pronunciation: bool,
    ) -> Result<Self, EpsimError> {
        let assessment = registry.authorize_analysis(actor, id, apply_pronunciation)?;
        let recording = assessment
            .recordings
            .get(index)
            .cloned()
            .ok_or(EpsimError::RecordingNotFound {
                assessment: id,
                index,
            })?;
        let expected = expected_text.filter(|t| !t.trim().is_empty()).or_else(|| {
            recording
                .question
                .and_then(|q| assessment.questions.get(q))
                .map(|q| q.text.clone())
        });
        Ok(Self {
            recording,
            expected,
        })
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Audio analysis service shared by the API and the CLI.
#[derive(Debug, Clone)]
pub struct Pipeline {
    audio_dir: Option<PathBuf>,
    max_bytes: u64,
    language: String,
    transcriber: Transcriber,
}

impl Pipeline {
    pub fn new(audio: &AudioConfig, transcriber: Transcriber) -> Self {
        Self {
            audio_dir: audio.directory.clone(),
            max_bytes: audio.max_bytes,
            language: audio.language.clone(),
            transcriber,
        }
    }

    pub fn from_config(
        audio: &AudioConfig,
        transcription: &TranscriptionConfig,
    ) -> Result<Self, EpsimError> {
        Ok(Self::new(audio, Transcriber::from_config(transcription)?))
    }

    /// Pipeline without an audio directory; every analysis is refused.
    pub fn disabled() -> Self {
        Self::new(&AudioConfig::default(), Transcriber::Disabled)
    }

    pub fn transcriber(&self) -> &Transcriber {
        &self.transcriber
    }

    /// Resolve a stored recording path to a readable file inside the
    /// audio directory.
    ///
    /// Canonicalization resolves `..` and symlinks, so the prefix check
    /// holds for the real location.
    pub async fn resolve(&self, file_path: &str) -> Result<PathBuf, EpsimError> {
        let root = self.audio_dir.as_deref().ok_or_else(|| {
            EpsimError::InvalidInput("No audio directory configured".to_string())
        })?;
        let root = tokio::fs::canonicalize(root).await.map_err(|e| {
            EpsimError::IoError(format!("Audio directory '{}': {}", root.display(), e))
        })?;

        let candidate = root.join(file_path);
        let canonical = tokio::fs::canonicalize(&candidate).await.map_err(|e| {
            EpsimError::InvalidInput(format!("Recording '{}' is not readable: {}", file_path, e))
        })?;
        if !canonical.starts_with(&root) {
            tracing::warn!(
                event = "path_rejected",
                path = %file_path,
                "Recording path escapes the audio directory"
            );
            return Err(EpsimError::InvalidInput(format!(
                "Recording '{}' is outside the audio directory",
                file_path
            )));
        }

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|e| EpsimError::IoError(format!("Cannot stat recording: {}", e)))?;
        if !metadata.is_file() {
            return Err(EpsimError::InvalidInput(format!(
                "Recording '{}' is not a regular file",
                file_path
            )));
        }
        if metadata.len() > self.max_bytes {
            return Err(EpsimError::InvalidInput(format!(
                "Recording size {} bytes exceeds maximum {} bytes",
                metadata.len(),
                self.max_bytes
            )));
        }
        Ok(canonical)
    }

    pub async fn run(&self, job: &AnalysisJob) -> Result<RecordingAnalysis, EpsimError> {
        self.analyze(&job.recording, job.expected.as_deref()).await
    }

    /// Analyze one recording, comparing against `expected` when given.
    pub async fn analyze(
        &self,
        recording: &AudioRecording,
        expected: Option<&str>,
    ) -> Result<RecordingAnalysis, EpsimError> {
        let path = self.resolve(&recording.file_path).await?;
        let format = AudioFormat::from_path(&path).ok_or_else(|| {
            EpsimError::InvalidInput(format!(
                "Unsupported audio format: {}",
                recording.file_name
            ))
        })?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| EpsimError::IoError(format!("Read recording: {}", e)))?;

        let language = if recording.language.is_empty() {
            self.language.clone()
        } else {
            recording.language.clone()
        };
        let mut analysis = RecordingAnalysis::new(language.clone());

        if format.is_decodable() {
            match decode_wav(&bytes) {
                Ok(metrics) => analysis.metrics = Some(metrics),
                Err(e) => {
                    tracing::warn!(event = "decode_failed", file = %recording.file_name, "{}", e);
                    analysis.push_error(e.to_string());
                }
            }
        } else {
            tracing::debug!(format = format.extension(), "No decoder, skipping metrics");
        }

        if let Transcriber::Whisper(client) = &self.transcriber {
            match client
                .transcribe(bytes, &recording.file_name, format, &language)
                .await
            {
                Ok(text) => analysis.set_transcript(text, None),
                Err(e) => {
                    tracing::warn!(
                        event = "transcription_failed",
                        file = %recording.file_name,
                        "{}",
                        e
                    );
                    analysis.push_error(e);
                }
            }
        }

        if let Some(expected) = expected {
            analysis.score_against(expected);
        }
        Ok(analysis)
    }
}

// =============================================================================
// WAV DECODING
// =============================================================================

/// Decode integer PCM WAV data and measure it.
///
/// Samples are brought to the 16-bit scale by shifting. Float WAV is not
/// supported.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioMetrics, EpsimError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| EpsimError::DeserializationError(format!("WAV header: {}", e)))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(EpsimError::InvalidInput(
            "Float WAV samples are not supported".to_string(),
        ));
    }

    let bits = spec.bits_per_sample;
    let samples: Vec<i16> = match bits {
        1..=16 => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v << (16 - bits)))
            .collect::<Result<Vec<i16>, _>>(),
        17..=32 => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v >> (bits - 16)) as i16))
            .collect::<Result<Vec<i16>, _>>(),
        _ => {
            return Err(EpsimError::InvalidInput(format!(
                "Unsupported bit depth: {}",
                bits
            )));
        }
    }
    .map_err(|e| EpsimError::DeserializationError(format!("WAV samples: {}", e)))?;

    AudioMetrics::analyze(&samples, spec.sample_rate, spec.channels)
}

/// Whether a stored path names an accepted audio format.
pub fn is_audio_path(path: &Path) -> bool {
    AudioFormat::from_path(path).is_some()
}

// =============================================================================
// TESTS
// =============================================================================
