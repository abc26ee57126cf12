//! cpal output stream feeding a [`SharedMixer`].

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use thiserror::Error;

use super::mixer::{Mixer, SharedMixer};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no default output device")]
    NoDevice,

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error(transparent)]
    Build(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    Play(#[from] cpal::PlayStreamError),
}

/// Open the default output device. The returned stream must be kept alive
/// for as long as sound is wanted; the mixer starts suspended.
pub fn open_default_output() -> Result<(SharedMixer, cpal::Stream), DeviceError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let mixer = SharedMixer::new(Mixer::suspended(config.sample_rate.0));
    let stream = match sample_format {
        SampleFormat::F32 => build::<f32>(&device, &config, mixer.clone())?,
        SampleFormat::I16 => build::<i16>(&device, &config, mixer.clone())?,
        SampleFormat::U16 => build::<u16>(&device, &config, mixer.clone())?,
        other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
    };
    stream.play()?;

    tracing::info!(
        device = %device.name().unwrap_or_default(),
        rate = config.sample_rate.0,
        channels = config.channels,
        "audio output opened"
    );
    Ok((mixer, stream))
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: SharedMixer,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.lock().render(&mut scratch, channels);
            for (dst, &src) in data.iter_mut().zip(&scratch) {
                *dst = T::from_sample(src);
            }
        },
        |err| tracing::error!(error = %err, "audio stream error"),
        None,
    )
}
