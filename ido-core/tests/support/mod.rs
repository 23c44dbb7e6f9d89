//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use ido_core::error::{IdoError, Result};
use ido_core::llm::{ChatCompletion, ChatMessage, LlmClient, ModelInfo};

/// Replays a fixed sequence of completions; errors once the script runs
/// dry so a test notices unexpected extra calls.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicU64,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(
                responses.into_iter().map(Into::into).collect(),
            ),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        _messages: &[ChatMessage],
        _max_tokens: u32,
        _temperature: f64,
    ) -> Result<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or_else(|| {
                IdoError::Llm("scripted responses exhausted".to_string())
            })?;
        Ok(ChatCompletion {
            content: next,
            prompt_tokens: 10,
            completion_tokens: 10,
            total_tokens: 20,
            cost: 0.0,
        })
    }

    fn active_model_info(&self) -> ModelInfo {
        ModelInfo {
            model: "scripted".to_string(),
            base_url: "local".to_string(),
        }
    }
}

/// A small busy JPEG whose content varies with `seed`, for feeding the
/// image pipeline. The image is an 8x8 grid of black/white blocks
/// scrambled by the seed, so different seeds produce clearly distinct
/// perceptual hashes while any one seed is deterministic.
pub fn sample_jpeg(seed: u32, width: u32, height: u32) -> Vec<u8> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    let block_w = (width / 8).max(1);
    let block_h = (height / 8).max(1);
    let img = RgbImage::from_fn(width, height, |x, y| {
        let bx = x / block_w;
        let by = y / block_h;
        let mixed = bx
            .wrapping_mul(73_856_093)
            ^ by.wrapping_mul(19_349_663)
            ^ seed.wrapping_mul(83_492_791);
        if (mixed >> 8) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 90);
    img.write_with_encoder(encoder).expect("encode jpeg");
    out
}
