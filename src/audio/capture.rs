// Live microphone capture via cpal
//
// The device callback owns the AudioWorklet outright; nothing is shared with
// the control thread except the worklet's atomic stats. Stopping drops the
// stream, which drops the worklet and its producer halves with it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;

use super::worklet::{AudioWorklet, WorkletStats};
use crate::error::{log_audio_error, AudioError};

/// Integer samples converted per pass in the i16 callback
const CONVERT_CHUNK: usize = 4096;

pub struct CaptureEngine {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream: Option<cpal::Stream>,
    stats: Option<Arc<WorkletStats>>,
}

impl CaptureEngine {
    /// Resolve the default input device and its preferred configuration
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        log::info!(
            "[CaptureEngine] Input device {:?}: {} Hz, {} channel(s), {:?}",
            device.name().unwrap_or_default(),
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );

        Ok(Self {
            device,
            config,
            stream: None,
            stats: None,
        })
    }

    /// Native device rate; the worklet must be configured for it
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }

    /// Stats of the running worklet, if any
    pub fn stats(&self) -> Option<Arc<WorkletStats>> {
        self.stats.clone()
    }

    /// Build and start the input stream, moving the worklet into its callback
    pub fn start(&mut self, mut worklet: AudioWorklet) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let stream_config: cpal::StreamConfig = self.config.clone().into();
        let channels = stream_config.channels as usize;
        let stats = worklet.stats();

        let err_fn = |err| log::error!("[CaptureEngine] Input stream error: {}", err);

        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    worklet.process(data, channels);
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => {
                let chunk = (CONVERT_CHUNK / channels.max(1)).max(1) * channels.max(1);
                let mut scratch = vec![0.0_f32; chunk];
                self.device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        for block in data.chunks(chunk) {
                            for (out, &sample) in scratch.iter_mut().zip(block) {
                                *out = sample as f32 / i16::MAX as f32;
                            }
                            worklet.process(&scratch[..block.len()], channels);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                let err = AudioError::UnsupportedFormat {
                    format: format!("{:?}", other),
                };
                log_audio_error(&err, "start");
                return Err(err);
            }
        }
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to start input stream: {:?}", e),
        })?;

        log::info!("[CaptureEngine] Capture started");
        self.stream = Some(stream);
        self.stats = Some(stats);
        Ok(())
    }

    /// Stop capture and release the stream
    pub fn stop(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.take().ok_or(AudioError::NotRunning)?;
        if let Err(e) = stream.pause() {
            log::warn!("[CaptureEngine] Pause before drop failed: {:?}", e);
        }
        drop(stream);
        log::info!("[CaptureEngine] Capture stopped");
        Ok(())
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.stream.is_some() {
            let _ = self.stop();
        }
    }
}
