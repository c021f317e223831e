//! PCM pipeline for realtime audio streaming.
//!
//! Converts captured float samples into 16-bit PCM, batches them into
//! fixed-size transmission chunks, and paces `commit` signals to the
//! transcription service.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

/// Sample rate the transcription service expects (24kHz mono PCM).
pub const TARGET_SAMPLE_RATE: u32 = 24000;

/// Samples per transmission chunk (~83ms at 24kHz).
pub const CHUNK_SAMPLES: usize = 2000;

/// Chunks that must be sent before a commit is considered.
pub const CHUNKS_PER_COMMIT: u32 = 24;

/// Minimum audio that must be sent before a commit, in milliseconds.
pub const COMMIT_MIN_AUDIO_MS: u32 = 100;

/// Minimum samples that must be sent before a commit (100ms at 24kHz).
pub const COMMIT_MIN_SAMPLES: usize =
    (TARGET_SAMPLE_RATE as usize * COMMIT_MIN_AUDIO_MS as usize) / 1000;

/// Convert float samples in [-1.0, 1.0] to 16-bit PCM.
///
/// Values outside the range are clamped. Scaling is asymmetric to cover
/// the full signed 16-bit range: negative values scale by 32768, zero and
/// positive values by 32767.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let clamped = s.clamp(-1.0, 1.0);
            if clamped < 0.0 {
                (clamped * 32768.0).round() as i16
            } else {
                (clamped * 32767.0).round() as i16
            }
        })
        .collect()
}

/// Encode a PCM chunk as base64 over its little-endian byte layout.
pub fn encode_chunk(chunk: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(chunk.len() * 2);
    for sample in chunk {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    BASE64_STANDARD.encode(bytes)
}

/// Rolling PCM buffer that emits fixed-size transmission chunks.
///
/// Samples are appended at the tail and extracted from the front in
/// `CHUNK_SAMPLES` slices, preserving order. A chunk stays buffered until
/// `pop_chunk` confirms it was handed off, so samples arriving while the
/// network is not ready are never dropped.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    buffer: Vec<i16>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append converted samples to the buffer tail.
    pub fn push(&mut self, samples: &[i16]) {
        self.buffer.extend_from_slice(samples);
    }

    /// The next complete chunk, if one is buffered. Does not consume it.
    pub fn front_chunk(&self) -> Option<&[i16]> {
        (self.buffer.len() >= CHUNK_SAMPLES).then(|| &self.buffer[..CHUNK_SAMPLES])
    }

    /// Discard the front chunk after it was successfully sent.
    pub fn pop_chunk(&mut self) {
        let len = CHUNK_SAMPLES.min(self.buffer.len());
        self.buffer.drain(..len);
    }

    /// Extract the next complete chunk, consuming it.
    pub fn next_chunk(&mut self) -> Option<Vec<i16>> {
        let chunk = self.front_chunk()?.to_vec();
        self.pop_chunk();
        Some(chunk)
    }

    /// Samples currently buffered (residual below one chunk after draining).
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all buffered samples (session teardown).
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Decides when to send a commit, balancing responsiveness against
/// transcript fragmentation.
///
/// A commit fires only when both counters cross their thresholds in the
/// same evaluation; firing resets both. The counters are also reset at
/// speech segment boundaries and after a benign empty-commit rejection,
/// so stale progress never carries across segments.
#[derive(Debug)]
pub struct CommitScheduler {
    chunks_sent: u32,
    samples_sent: usize,
    min_chunks: u32,
    min_samples: usize,
}

impl Default for CommitScheduler {
    fn default() -> Self {
        Self {
            chunks_sent: 0,
            samples_sent: 0,
            min_chunks: CHUNKS_PER_COMMIT,
            min_samples: COMMIT_MIN_SAMPLES,
        }
    }
}

impl CommitScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully sent chunk. Returns true when a commit should
    /// follow it; the counters reset as part of firing.
    pub fn record(&mut self, chunk_len: usize) -> bool {
        self.chunks_sent += 1;
        self.samples_sent += chunk_len;

        if self.chunks_sent >= self.min_chunks && self.samples_sent >= self.min_samples {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Reset both counters without firing.
    pub fn reset(&mut self) {
        self.chunks_sent = 0;
        self.samples_sent = 0;
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    pub fn samples_sent(&self) -> usize {
        self.samples_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_boundaries() {
        assert_eq!(quantize(&[-1.0]), vec![-32768]);
        assert_eq!(quantize(&[1.0]), vec![32767]);
        assert_eq!(quantize(&[0.0]), vec![0]);
    }

    #[test]
    fn test_quantize_asymmetric_scaling() {
        assert_eq!(quantize(&[0.5]), vec![16384]); // round(0.5 * 32767)
        assert_eq!(quantize(&[-0.5]), vec![-16384]);
        assert_eq!(quantize(&[-0.25]), vec![-8192]);
    }

    #[test]
    fn test_quantize_clamps_out_of_range() {
        assert_eq!(quantize(&[2.0]), vec![32767]);
        assert_eq!(quantize(&[-3.5]), vec![-32768]);
    }

    #[test]
    fn test_quantize_nan_is_zero() {
        // Implementation-defined: NaN survives the clamp and casts to 0.
        assert_eq!(quantize(&[f32::NAN]), vec![0]);
    }

    #[test]
    fn test_quantize_preserves_length() {
        let input: Vec<f32> = (0..4096).map(|i| (i as f32 / 4096.0) - 0.5).collect();
        assert_eq!(quantize(&input).len(), input.len());
    }

    #[test]
    fn test_assembler_exact_multiple() {
        let mut assembler = ChunkAssembler::new();
        let samples: Vec<i16> = (0..(CHUNK_SAMPLES as i16 * 3)).map(|i| i % 1000).collect();
        assembler.push(&samples[..CHUNK_SAMPLES + 500]);
        assembler.push(&samples[CHUNK_SAMPLES + 500..]);

        let mut chunks = Vec::new();
        while let Some(chunk) = assembler.next_chunk() {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == CHUNK_SAMPLES));
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_assembler_residual_stays_buffered() {
        let mut assembler = ChunkAssembler::new();
        assembler.push(&vec![7i16; CHUNK_SAMPLES + 123]);

        assert!(assembler.next_chunk().is_some());
        assert!(assembler.next_chunk().is_none());
        assert_eq!(assembler.buffered_len(), 123);

        // Residual joins the next append.
        assembler.push(&vec![7i16; CHUNK_SAMPLES - 123]);
        assert!(assembler.next_chunk().is_some());
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_assembler_round_trip_preserves_order() {
        let mut assembler = ChunkAssembler::new();
        let input: Vec<i16> = (0..5431).map(|i| (i % 32768) as i16).collect();
        for batch in input.chunks(777) {
            assembler.push(batch);
        }

        let mut reconstructed = Vec::new();
        while let Some(chunk) = assembler.next_chunk() {
            reconstructed.extend_from_slice(&chunk);
        }
        // Emitted chunks plus the residual reconstruct the exact input.
        let residual = input.len() % CHUNK_SAMPLES;
        assert_eq!(assembler.buffered_len(), residual);
        assert_eq!(reconstructed, input[..input.len() - residual]);
    }

    #[test]
    fn test_front_chunk_is_not_consuming() {
        let mut assembler = ChunkAssembler::new();
        assembler.push(&vec![1i16; CHUNK_SAMPLES]);

        assert!(assembler.front_chunk().is_some());
        assert!(assembler.front_chunk().is_some());
        assert_eq!(assembler.buffered_len(), CHUNK_SAMPLES);

        assembler.pop_chunk();
        assert!(assembler.front_chunk().is_none());
    }

    #[test]
    fn test_encode_chunk_little_endian() {
        let encoded = encode_chunk(&[1, -2, 256]);
        let bytes = BASE64_STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x00, 0x01]);
    }

    #[test]
    fn test_encode_chunk_round_trip() {
        let chunk: Vec<i16> = vec![0, 1, -1, i16::MAX, i16::MIN, 12345, -12345];
        let bytes = BASE64_STANDARD.decode(encode_chunk(&chunk)).unwrap();
        let decoded: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn test_commit_fires_when_both_thresholds_met() {
        let mut scheduler = CommitScheduler::new();
        for _ in 0..CHUNKS_PER_COMMIT - 1 {
            assert!(!scheduler.record(CHUNK_SAMPLES));
        }
        // 24th chunk: 24 chunks and 48000 samples, both thresholds met.
        assert!(scheduler.record(CHUNK_SAMPLES));
        assert_eq!(scheduler.chunks_sent(), 0);
        assert_eq!(scheduler.samples_sent(), 0);
    }

    #[test]
    fn test_commit_requires_both_thresholds() {
        let mut scheduler = CommitScheduler::new();
        // Enough chunks but almost no audio: must not fire.
        for _ in 0..CHUNKS_PER_COMMIT * 2 {
            assert!(!scheduler.record(1));
        }
        // Next full chunk pushes samples past the floor with chunks already over.
        assert!(scheduler.record(CHUNK_SAMPLES * 2));
    }

    #[test]
    fn test_commit_reset_discards_progress() {
        let mut scheduler = CommitScheduler::new();
        for _ in 0..CHUNKS_PER_COMMIT - 1 {
            scheduler.record(CHUNK_SAMPLES);
        }
        scheduler.reset();
        // Segment boundary reset: the next chunk starts from zero.
        assert!(!scheduler.record(CHUNK_SAMPLES));
        assert_eq!(scheduler.chunks_sent(), 1);
    }
}
