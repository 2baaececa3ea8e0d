//! # Audio Analysis
//!
//! Quality metrics over decoded PCM samples and the word-overlap
//! pronunciation heuristic.
//!
//! All measurements are integers: levels stay on the `i16` sample scale,
//! rates are per-mille and durations are milliseconds. Decoding and
//! transcription happen in the app layer; this module only sees samples
//! and text.

use crate::primitives::{ANALYSIS_FRAME_MS, MAX_SCORE_TENTHS, SILENCE_RATIO_PER_TEN_THOUSAND};
use crate::score::Score;
use crate::EpsimError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// AUDIO FORMAT
// =============================================================================

/// Accepted recording formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Ogg,
}

impl AudioFormat {
    /// Match a file extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "ogg" => Some(Self::Ogg),
            _ => None,
        }
    }

    /// Format of a file, judged by its extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
        }
    }

    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Ogg => "audio/ogg",
        }
    }

    /// Only PCM WAV is decoded locally; the others can still be
    /// transcribed remotely.
    #[must_use]
    pub fn is_decodable(&self) -> bool {
        matches!(self, Self::Wav)
    }
}

// =============================================================================
// AUDIO METRICS
// =============================================================================

/// Quality measurements for one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetrics {
    pub duration_ms: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Root-mean-square level on the `i16` scale.
    pub rms: u16,
    /// Largest absolute sample.
    pub peak: u16,
    /// Sign changes per thousand adjacent sample pairs.
    pub zero_crossing_permille: u16,
    pub silence_ms: u32,
    pub speech_ms: u32,
}

impl AudioMetrics {
    /// Measure interleaved PCM samples.
    ///
    /// Channels are mixed down to mono first. Silence is counted on
    /// fixed-length frames whose RMS falls 30 dB or more below
    /// the loudest frame.
    pub fn analyze(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Self, EpsimError> {
        if sample_rate == 0 {
            return Err(EpsimError::InvalidInput("Sample rate must be positive".to_string()));
        }
        if channels == 0 {
            return Err(EpsimError::InvalidInput("Channel count must be positive".to_string()));
        }

        let mono = mix_down(samples, channels);
        let rate = u64::from(sample_rate);
        let duration_ms = to_ms(mono.len() as u64, rate);

        let sum_squares: u64 = mono.iter().map(|&s| square(s)).sum();
        let rms = if mono.is_empty() {
            0
        } else {
            (sum_squares / mono.len() as u64).isqrt() as u16
        };
        let peak = mono.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);

        let crossings = mono
            .windows(2)
            .filter(|pair| (pair[0] < 0) != (pair[1] < 0))
            .count() as u64;
        let zero_crossing_permille = match mono.len() {
            0 | 1 => 0,
            n => (crossings * 1000 / (n as u64 - 1)) as u16,
        };

        let silent_samples = silent_sample_count(&mono, rate);
        let silence_ms = to_ms(silent_samples, rate).min(duration_ms);

        Ok(Self {
            duration_ms,
            sample_rate,
            channels,
            rms,
            peak,
            zero_crossing_permille,
            silence_ms,
            speech_ms: duration_ms - silence_ms,
        })
    }
}

fn mix_down(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels == 1 {
        return samples.to_vec();
    }
    let width = usize::from(channels);
    samples
        .chunks_exact(width)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / i32::from(channels)) as i16
        })
        .collect()
}

fn square(sample: i16) -> u64 {
    let s = u64::from(sample.unsigned_abs());
    s * s
}

fn to_ms(samples: u64, rate: u64) -> u32 {
    u32::try_from(samples * 1000 / rate).unwrap_or(u32::MAX)
}

/// Number of samples in frames below the silence threshold.
fn silent_sample_count(mono: &[i16], rate: u64) -> u64 {
    let frame_len = ((rate * u64::from(ANALYSIS_FRAME_MS) / 1000) as usize).max(1);
    let frames: Vec<(u64, u64)> = mono
        .chunks(frame_len)
        .map(|frame| {
            let energy: u64 = frame.iter().map(|&s| square(s)).sum();
            (energy / frame.len() as u64, frame.len() as u64)
        })
        .collect();

    let loudest = frames.iter().map(|(mean, _)| *mean).max().unwrap_or(0);
    if loudest == 0 {
        return mono.len() as u64;
    }

    // rms < loudest_rms * ratio, compared on squares to stay in integers.
    let ratio = u128::from(SILENCE_RATIO_PER_TEN_THOUSAND);
    let threshold = u128::from(loudest) * ratio * ratio;
    frames
        .iter()
        .filter(|(mean, _)| u128::from(*mean) * 100_000_000 < threshold)
        .map(|(_, len)| len)
        .sum()
}

// =============================================================================
// PRONUNCIATION HEURISTIC
// =============================================================================

/// Lowercase words made of alphanumerics and inner apostrophes.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|word| word.trim_matches('\'').to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

/// Per-mille of expected words found in the transcript.
///
/// Each transcript word can match one expected word, so a repeated
/// expected word needs to be spoken as many times.
#[must_use]
pub fn word_overlap(expected: &str, transcript: &str) -> u16 {
    let wanted = tokenize(expected);
    if wanted.is_empty() {
        return 0;
    }

    let mut spoken: BTreeMap<String, usize> = BTreeMap::new();
    for word in tokenize(transcript) {
        *spoken.entry(word).or_insert(0) += 1;
    }

    let mut matched = 0usize;
    for word in &wanted {
        if let Some(count) = spoken.get_mut(word) {
            if *count > 0 {
                *count -= 1;
                matched += 1;
            }
        }
    }
    (matched * 1000 / wanted.len()) as u16
}

/// Map word overlap linearly onto 0.0..=6.0, rounding half up.
#[must_use]
pub fn pronunciation_score(expected: &str, transcript: &str) -> Score {
    let overlap = u32::from(word_overlap(expected, transcript));
    let tenths = (overlap * u32::from(MAX_SCORE_TENTHS) + 500) / 1000;
    Score::from_tenths(tenths).unwrap_or(Score::MAX)
}

// =============================================================================
// RECORDING ANALYSIS
// =============================================================================

/// Everything the audio pipeline learned about one recording.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordingAnalysis {
    pub transcript: Option<String>,
    pub confidence_permille: Option<u16>,
    pub metrics: Option<AudioMetrics>,
    pub word_count: usize,
    pub language: String,
    pub pronunciation: Option<Score>,
    /// Set when a stage failed; the other fields hold what succeeded.
    pub error: Option<String>,
}

impl RecordingAnalysis {
    /// Empty analysis for a language.
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    /// Attach a transcript and update the word count.
    pub fn set_transcript(&mut self, transcript: String, confidence_permille: Option<u16>) {
        self.word_count = transcript.split_whitespace().count();
        self.transcript = Some(transcript);
        self.confidence_permille = confidence_permille.map(|c| c.min(1000));
    }

    /// Score pronunciation against `expected` if a transcript exists.
    pub fn score_against(&mut self, expected: &str) {
        if let Some(transcript) = &self.transcript {
            if !tokenize(expected).is_empty() {
                self.pronunciation = Some(pronunciation_score(expected, transcript));
            }
        }
    }

    /// Record a failure, keeping earlier messages.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error = Some(match self.error.take() {
            Some(previous) => format!("{}; {}", previous, message),
            None => message,
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
