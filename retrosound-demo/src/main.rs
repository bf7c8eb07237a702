mod assets;

use anyhow::Result;
use retrosound::{AudioDriver, CpalMixer, DriverConfig, TrackStore};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    // `--test-mode` skips the drain on close
    let test_mode = std::env::args().any(|arg| arg == "--test-mode");

    let mut driver = AudioDriver::with_config(CpalMixer::new(), DriverConfig::default());
    driver.set_test_mode(test_mode);
    let sounds = assets::sounds();
    let mut names: Vec<&str> = sounds.names().collect();
    names.sort_unstable();
    log::info!("Sound effects: {}", names.join(", "));
    driver.init_audio(Arc::new(sounds))?;

    let tracks: TrackStore = [assets::theme()].into_iter().collect();
    driver.init_music(Arc::new(tracks))?;

    log::info!("=== Full volume ===");
    driver.play("DSITMBK")?;
    thread::sleep(Duration::from_millis(400));
    driver.play("DSPISTOL")?;
    thread::sleep(Duration::from_millis(400));

    log::info!("=== Around the listener ===");
    for angle in (0..360).step_by(45) {
        log::info!("DSPISTOL at {} degrees", angle);
        driver.play_at_position("DSPISTOL", 40.0, angle)?;
        thread::sleep(Duration::from_millis(350));
    }

    log::info!("=== Walking away ===");
    for distance in [0.0, 64.0, 128.0, 192.0, 255.0, 400.0] {
        log::info!("DSITMBK at distance {}", distance);
        driver.play_at_position("DSITMBK", distance, 0)?;
        thread::sleep(Duration::from_millis(300));
    }

    log::info!("=== Music ===");
    driver.play_track("D_DEMO")?;
    thread::sleep(Duration::from_secs(6));

    driver.play("DSPISTOL")?;
    driver.close();
    Ok(())
}
