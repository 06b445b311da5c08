//! Platform output device through cpal.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on its own device thread
//! for the backend's whole lifetime. The output callback renders the shared
//! [`Mixer`] directly and never touches any other lock.

use super::{AudioBackend, BackendKind, HardwareVoice, VoiceFormat};
use crate::mixer::Mixer;
use chime_core::{ChimeError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Callback block assumed when the device picks its own buffer size.
const DEFAULT_CALLBACK_FRAMES: usize = 1024;

/// Output through the default cpal device.
pub struct NativeBackend {
    mixer: Arc<Mixer>,
    device_name: String,
    stop_tx: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl NativeBackend {
    /// Open the default output device and start its stream.
    pub fn open() -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<(Arc<Mixer>, String)>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("chime-device".into())
            .spawn(move || match open_stream() {
                Ok((stream, mixer, name)) => {
                    let _ = ready_tx.send(Ok((mixer, name)));
                    // Park until shutdown; the stream stops when dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| ChimeError::Thread(format!("failed to spawn device thread: {}", e)))?;

        let (mixer, device_name) = ready_rx
            .recv()
            .map_err(|_| ChimeError::DeviceUnavailable("device thread exited".into()))??;

        info!(
            "Opened audio device '{}' ({} Hz, {} channels)",
            device_name,
            mixer.sample_rate(),
            mixer.channels()
        );

        Ok(Self {
            mixer,
            device_name,
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn open_stream() -> Result<(Stream, Arc<Mixer>, String)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ChimeError::DeviceUnavailable("no default output device".into()))?;
    let name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_output_config()
        .map_err(|e| ChimeError::DeviceUnavailable(format!("no output config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let mixer = Arc::new(Mixer::new(config.sample_rate.0, config.channels));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&mixer)),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&mixer)),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&mixer)),
        other => Err(ChimeError::DeviceUnavailable(format!(
            "unsupported sample format {:?}",
            other
        ))),
    }?;
    stream
        .play()
        .map_err(|e| ChimeError::Hardware(format!("failed to start output stream: {}", e)))?;

    Ok((stream, mixer, name))
}

fn build_stream<T>(device: &cpal::Device, config: &StreamConfig, mixer: Arc<Mixer>) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    // Allocated once; the callback never grows it.
    let mut scratch = vec![0.0f32; scratch_len(config)];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                render_converted(&mixer, &mut scratch, data);
            },
            |err| warn!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| ChimeError::DeviceUnavailable(format!("failed to build stream: {}", e)))
}

/// Interleaved scratch length for one callback block.
fn scratch_len(config: &StreamConfig) -> usize {
    let frames = match config.buffer_size {
        BufferSize::Fixed(frames) => frames as usize,
        BufferSize::Default => DEFAULT_CALLBACK_FRAMES,
    };
    frames.max(1) * (config.channels.max(1) as usize)
}

/// Mix into `data` in scratch-sized blocks, converting to the device format.
/// `scratch.len()` must be a non-zero multiple of the channel count.
fn render_converted<T>(mixer: &Mixer, scratch: &mut [f32], data: &mut [T])
where
    T: SizedSample + FromSample<f32>,
{
    for chunk in data.chunks_mut(scratch.len()) {
        let block = &mut scratch[..chunk.len()];
        mixer.render(block);
        for (out, sample) in chunk.iter_mut().zip(block.iter()) {
            *out = T::from_sample(*sample);
        }
    }
}

impl AudioBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn has_device(&self) -> bool {
        self.stop_tx.lock().is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    fn create_voice(&self, format: VoiceFormat) -> Result<Arc<dyn HardwareVoice>> {
        let voice = self.mixer.add_voice(format)?;
        Ok(voice)
    }

    fn set_master_volume(&self, volume: f64) {
        self.mixer.set_master_volume(volume);
    }

    fn master_volume(&self) -> f64 {
        self.mixer.master_volume()
    }

    fn shutdown(&self) {
        self.mixer.shutdown();
        if self.stop_tx.lock().take().is_none() {
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("Audio device thread panicked");
            }
        }
        info!("Closed audio device '{}'", self.device_name);
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
