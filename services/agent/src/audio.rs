use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

// Sample rates at the two ends of the bridge
pub const ROOM_SAMPLE_RATE: f64 = 48000.0;
pub const MODEL_INPUT_SAMPLE_RATE: f64 = 16000.0;
pub const MODEL_OUTPUT_SAMPLE_RATE: f64 = 24000.0;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1, // mono
    )?;
    Ok(resampler)
}

/// Runs `samples` through the resampler in fixed-size chunks. A trailing
/// chunk shorter than the resampler's input size is dropped; realtime
/// streams deliver the remainder with the next frame.
pub fn resample_chunks(resampler: &mut FastFixedIn<f32>, samples: &[f32]) -> Vec<f32> {
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::new();
    for chunk in samples.chunks(chunk_size) {
        if let Ok(resampled) = resampler.process(&[chunk.to_vec()], None) {
            out.extend_from_slice(&resampled[0]);
        }
    }
    out
}

/// Decodes base64 PCM16 into normalized f32 samples in [-1.0, 1.0].
pub fn decode_base64_pcm16_to_f32(base64_fragment: &str) -> Vec<f32> {
    if let Ok(pcm16_bytes) = base64::engine::general_purpose::STANDARD.decode(base64_fragment) {
        pcm16_bytes
            .chunks_exact(2)
            .map(|chunk| {
                let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                (v as f32 / 32768.0).clamp(-1.0, 1.0)
            })
            .collect()
    } else {
        tracing::error!("Failed to decode base64 audio fragment");
        Vec::new()
    }
}

/// Encodes f32 samples as base64 PCM16, clamping into the valid range.
pub fn encode_f32_as_base64_pcm16(pcm32: &[f32]) -> String {
    let pcm16: Vec<u8> = pcm32
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

/// Converts i16 PCM samples to normalized f32 samples.
pub fn pcm16_to_f32(pcm16: &[i16]) -> Vec<f32> {
    pcm16
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Converts normalized f32 samples to i16 PCM samples.
pub fn f32_to_pcm16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn create_resampler_for_bridge_rates() {
        assert!(create_resampler(ROOM_SAMPLE_RATE, MODEL_INPUT_SAMPLE_RATE, 512).is_ok());
        assert!(create_resampler(MODEL_OUTPUT_SAMPLE_RATE, ROOM_SAMPLE_RATE, 512).is_ok());
    }

    #[test]
    fn resample_chunks_changes_the_sample_count() {
        let mut resampler = create_resampler(48000.0, 16000.0, 512).unwrap();
        let input = vec![0.25f32; 1024];
        let output = resample_chunks(&mut resampler, &input);

        // Two full chunks at a 3:1 ratio.
        assert!(!output.is_empty());
        assert!(output.len() < input.len());
    }

    #[test]
    fn resample_chunks_drops_a_short_trailing_chunk() {
        let mut resampler = create_resampler(48000.0, 16000.0, 512).unwrap();
        let output = resample_chunks(&mut resampler, &[0.5f32; 100]);
        assert!(output.is_empty());
    }

    #[test]
    fn decode_known_pcm16_values() {
        // 16384 little endian = [0x00, 0x40]; normalized to 0.5.
        let encoded = base64::engine::general_purpose::STANDARD.encode([0x00u8, 0x40, 0x00, 0x80]);
        let decoded = decode_base64_pcm16_to_f32(&encoded);

        assert_eq!(decoded.len(), 2);
        assert_abs_diff_eq!(decoded[0], 0.5, epsilon = 0.0001);
        assert_abs_diff_eq!(decoded[1], -1.0, epsilon = 0.0001);
    }

    #[test]
    fn decode_rejects_invalid_base64_and_odd_lengths() {
        assert!(decode_base64_pcm16_to_f32("not base64!").is_empty());
        let one_byte = base64::engine::general_purpose::STANDARD.encode([0x7fu8]);
        assert!(decode_base64_pcm16_to_f32(&one_byte).is_empty());
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let encoded = encode_f32_as_base64_pcm16(&[2.0, -2.0, 0.5]);
        let decoded = decode_base64_pcm16_to_f32(&encoded);

        assert_eq!(decoded.len(), 3);
        assert!(decoded[0] <= 1.0);
        assert!(decoded[1] >= -1.0);
        assert_abs_diff_eq!(decoded[2], 0.5, epsilon = 0.001);
    }

    #[test]
    fn pcm16_f32_conversions_agree() {
        let original = vec![0i16, 16384, -16384, i16::MAX];
        let as_f32 = pcm16_to_f32(&original);
        assert_abs_diff_eq!(as_f32[1], 0.5, epsilon = 0.0001);

        let back = f32_to_pcm16(&as_f32);
        for (a, b) in original.iter().zip(back.iter()) {
            assert!((a - b).abs() <= 1, "{a} vs {b}");
        }
    }
}
