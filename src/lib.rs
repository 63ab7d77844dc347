pub use training;
pub use training::*;

use candle_core::Device;

/// Picks the accelerator to train on: CPU when `CANDLE_FORCE_CPU` is set,
/// otherwise the first CUDA device if one is usable, otherwise CPU.
pub fn setup_device() -> anyhow::Result<Device> {
    log::debug!("starting device detection");

    if std::env::var("CANDLE_FORCE_CPU").is_ok() {
        log::info!("CANDLE_FORCE_CPU set, using CPU backend");
        return Ok(Device::Cpu);
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            log::info!("CUDA device selected: {:?}", device);
            Ok(device)
        }
        Ok(_) => {
            log::info!("using CPU backend");
            Ok(Device::Cpu)
        }
        Err(err) => {
            log::warn!("CUDA probe failed ({err}), using CPU backend");
            Ok(Device::Cpu)
        }
    }
}

/// Device selection followed by [`seed_all`], the usual first step of a run.
pub fn prepare_run(seed: u64) -> anyhow::Result<(Device, SeededRngs)> {
    let device = setup_device()?;
    let rngs = seed_all(seed, &device)?;
    log::info!("seeded run with {} on {:?}", seed, device);
    Ok((device, rngs))
}
